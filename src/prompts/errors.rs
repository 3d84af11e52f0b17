//! Prompt rendering errors

use crate::reasoner::ReasoningTask;
use thiserror::Error;

/// Errors raised while building or rendering prompt templates
#[derive(Debug, Error)]
pub enum PromptError {
    /// A template references a variable the step did not supply
    #[error("undefined variable '{name}' in {template}{}", .suggestion.as_ref().map(|s| format!(", did you mean '{}'?", s)).unwrap_or_default())]
    UndefinedVariable {
        template: String,
        name: String,
        suggestion: Option<String>,
    },

    #[error("syntax error in {template} at line {line}: {message}")]
    Syntax {
        template: String,
        line: usize,
        message: String,
    },

    #[error("failed to render {template}: {message}")]
    Render { template: String, message: String },

    #[error("no prompt registered for task '{0}'")]
    UnknownTask(ReasoningTask),
}

impl PromptError {
    /// Classify a minijinja failure for the named template
    pub fn from_minijinja(template: &str, err: minijinja::Error, known: &[String]) -> Self {
        match err.kind() {
            minijinja::ErrorKind::UndefinedError => {
                let name = quoted_name(&err.to_string()).unwrap_or_else(|| "unknown".into());
                let candidates: Vec<&str> = known.iter().map(String::as_str).collect();
                Self::UndefinedVariable {
                    template: template.to_string(),
                    suggestion: suggest_correction(&name, &candidates),
                    name,
                }
            }
            minijinja::ErrorKind::SyntaxError => Self::Syntax {
                template: template.to_string(),
                line: err.line().unwrap_or(0),
                message: err.to_string(),
            },
            _ => Self::Render {
                template: template.to_string(),
                message: err.to_string(),
            },
        }
    }
}

/// Pull the first backtick-quoted name out of an error message
fn quoted_name(msg: &str) -> Option<String> {
    let start = msg.find('`')?;
    let end = msg[start + 1..].find('`')?;
    Some(msg[start + 1..start + 1 + end].to_string())
}

/// Closest known name within a small edit distance
pub fn suggest_correction(typo: &str, candidates: &[&str]) -> Option<String> {
    let max_distance = (typo.chars().count() / 2).max(2);

    candidates
        .iter()
        .map(|c| (levenshtein(typo, c), *c))
        .filter(|(d, _)| *d <= max_distance)
        .min_by_key(|(d, _)| *d)
        .map(|(_, c)| c.to_string())
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut row = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            row[j + 1] = (prev[j + 1] + 1).min(row[j] + 1).min(prev[j] + cost);
        }
        prev = row;
    }

    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("summary", "summary"), 0);
    }

    #[test]
    fn test_suggest_correction() {
        let known = ["message", "context", "summary"];
        assert_eq!(suggest_correction("sumary", &known), Some("summary".into()));
        assert_eq!(suggest_correction("entity_id", &known), None);
        assert_eq!(suggest_correction("anything", &[]), None);
    }

    #[test]
    fn test_display_with_suggestion() {
        let err = PromptError::UndefinedVariable {
            template: "converse.user".into(),
            name: "mesage".into(),
            suggestion: Some("message".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("undefined variable 'mesage' in converse.user"));
        assert!(msg.contains("did you mean 'message'"));
    }
}
