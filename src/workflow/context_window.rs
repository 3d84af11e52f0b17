//! Rolling window of recent exchanges handed to the reasoner
//!
//! The context is plain text: each turn is `"\nHuman:<message>\nSystem:<answer>"`.
//! Only the last [`WINDOW_TURNS`] turns are kept; older ones are gone from the
//! context for good.

use serde::Serialize;

pub const TURN_DELIMITER: &str = "\nHuman:";
pub const ANSWER_MARKER: &str = "\nSystem:";
pub const WINDOW_TURNS: usize = 3;

/// One human/system exchange recovered from the context text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exchange {
    pub human: String,
    pub system: String,
}

/// Append a turn and trim the result to the window
pub fn append_turn(context: &str, message: &str, answer: &str) -> String {
    let full = format!("{context}{TURN_DELIMITER}{message}{ANSWER_MARKER}{answer}");
    trim_window(&full)
}

/// Keep only the last turns of `context`
pub fn trim_window(context: &str) -> String {
    let turns = segments(context);
    let skip = turns.len().saturating_sub(WINDOW_TURNS);

    turns
        .into_iter()
        .skip(skip)
        .map(|turn| format!("{TURN_DELIMITER}{turn}"))
        .collect()
}

pub fn count_turns(context: &str) -> usize {
    segments(context).len()
}

/// Split the context into its exchanges, oldest first
pub fn parse_turns(context: &str) -> Vec<Exchange> {
    segments(context)
        .into_iter()
        .map(|turn| match turn.split_once(ANSWER_MARKER) {
            Some((human, system)) => Exchange {
                human: human.to_string(),
                system: system.to_string(),
            },
            None => Exchange {
                human: turn.to_string(),
                system: String::new(),
            },
        })
        .collect()
}

fn segments(context: &str) -> Vec<&str> {
    context
        .split(TURN_DELIMITER)
        .filter(|segment| !segment.is_empty())
        .collect()
}
