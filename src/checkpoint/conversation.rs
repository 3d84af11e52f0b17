//! Read-side view of a conversation rebuilt from its checkpoints

use super::{Checkpoint, CheckpointKind};
use crate::workflow::{Exchange, parse_turns};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Full transcript of a thread
///
/// Unlike the rolling context window, the transcript keeps every turn that
/// is still in the checkpoint history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub thread_id: String,
    pub messages: Vec<ConversationMessage>,
    /// Exchanges the reasoner currently sees as context, oldest first
    pub window: Vec<Exchange>,
    pub checkpoint_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationView {
    /// Build the view from a newest-first history; `None` when it is empty
    pub fn from_history(thread_id: &str, history: &[Checkpoint]) -> Option<Self> {
        let newest = history.first()?;
        let oldest = history.last()?;

        let messages = history
            .iter()
            .rev()
            .filter(|c| c.kind == CheckpointKind::Turn)
            .flat_map(|c| {
                [
                    ConversationMessage {
                        role: Role::User,
                        content: c.state.message.clone(),
                        timestamp: c.created_at,
                    },
                    ConversationMessage {
                        role: Role::Assistant,
                        content: c.state.answer().to_string(),
                        timestamp: c.created_at,
                    },
                ]
            })
            .collect();

        Some(Self {
            thread_id: thread_id.to_string(),
            messages,
            window: parse_turns(&newest.state.context),
            checkpoint_count: history.len(),
            created_at: oldest.created_at,
            updated_at: newest.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::ConversationState;
    use chrono::Duration;

    fn checkpoint(seq: i64, kind: CheckpointKind, message: &str, answer: &str) -> Checkpoint {
        Checkpoint {
            thread_id: "thread_v".into(),
            seq,
            kind,
            state: ConversationState::default()
                .begin_turn(message)
                .with_answer(answer),
            created_at: DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(seq),
        }
    }

    #[test]
    fn test_empty_history() {
        assert!(ConversationView::from_history("thread_v", &[]).is_none());
    }

    #[test]
    fn test_transcript_from_turns_only() {
        let history = vec![
            checkpoint(3, CheckpointKind::Turn, "Campinas", "812 votos"),
            checkpoint(2, CheckpointKind::Step, "Campinas", ""),
            checkpoint(1, CheckpointKind::Turn, "Hélio", "Em qual cidade?"),
        ];

        let view = ConversationView::from_history("thread_v", &history).unwrap();

        assert_eq!(view.checkpoint_count, 3);
        let contents: Vec<&str> = view.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["Hélio", "Em qual cidade?", "Campinas", "812 votos"]);
        assert_eq!(view.messages[0].role, Role::User);
        assert_eq!(view.messages[1].role, Role::Assistant);
        assert!(view.created_at < view.updated_at);
    }

    #[test]
    fn test_window_comes_from_newest_context() {
        let older = checkpoint(1, CheckpointKind::Turn, "Hélio", "Em qual cidade?");
        let mut newest = checkpoint(2, CheckpointKind::Turn, "Campinas", "812 votos");
        newest.state = newest
            .state
            .with_context("\nHuman:Hélio\nSystem:Em qual cidade?\nHuman:Campinas\nSystem:812 votos");

        let view = ConversationView::from_history("thread_v", &[newest, older]).unwrap();

        assert_eq!(view.window.len(), 2);
        assert_eq!(view.window[1].human, "Campinas");
        assert_eq!(view.window[1].system, "812 votos");
    }

    #[test]
    fn test_serialized_shape() {
        let history = vec![checkpoint(1, CheckpointKind::Turn, "oi", "fora de escopo")];
        let view = ConversationView::from_history("thread_v", &history).unwrap();

        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["threadId"], "thread_v");
        assert_eq!(value["checkpointCount"], 1);
        assert_eq!(value["messages"][0]["role"], "user");
        assert!(value["window"].as_array().unwrap().is_empty());
    }
}
