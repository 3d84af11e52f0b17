//! Custom template filters

use minijinja::value::Value;
use minijinja::{Error, ErrorKind, State};

pub fn register_filters(env: &mut minijinja::Environment) {
    env.add_filter("json", filter_json);
}

/// Serialize a value to compact JSON
fn filter_json(_state: &State, value: Value) -> Result<Value, Error> {
    let json = serde_json::to_string(&value).map_err(|e| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("JSON serialization failed: {}", e),
        )
    })?;
    Ok(Value::from(json))
}
