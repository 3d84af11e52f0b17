//! Locate the JSON object in reasoner output
//!
//! Models asked for JSON still wrap it in markdown fences or prose now and then.

use serde_json::{Deserializer, Value};

/// Extract the first JSON object from text
pub fn extract_object(text: &str) -> Option<Value> {
    let trimmed = text.trim();

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    if let Some(value) = fenced_object(trimmed) {
        return Some(value);
    }

    // Scan each opening brace and let serde stop at the end of the first complete value
    trimmed.match_indices('{').find_map(|(start, _)| {
        let mut stream = Deserializer::from_str(&trimmed[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value @ Value::Object(_))) => Some(value),
            _ => None,
        }
    })
}

/// Parse the body of the first fenced code block, with or without a language tag
fn fenced_object(text: &str) -> Option<Value> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    // Skip the language tag line (`json`, `JSON`, or nothing)
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let close = body.find("```")?;

    match serde_json::from_str::<Value>(body[..close].trim()) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}
