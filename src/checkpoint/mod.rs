//! Conversation checkpoints
//!
//! Every save appends a snapshot of the conversation state; nothing is
//! updated in place. `load` returns the newest snapshot, or the default state
//! for a thread that has never been saved.

mod conversation;
mod memory;
mod schema;
mod sqlite;

pub use conversation::{ConversationView, Role};
pub use memory::InMemoryCheckpointStore;
pub use sqlite::SqliteCheckpointStore;

use crate::workflow::ConversationState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// What a checkpoint marks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    /// State after a single step, mid-turn
    Step,
    /// State at the end of a turn
    Turn,
}

impl CheckpointKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckpointKind::Step => "step",
            CheckpointKind::Turn => "turn",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "step" => Some(CheckpointKind::Step),
            "turn" => Some(CheckpointKind::Turn),
            _ => None,
        }
    }
}

impl fmt::Display for CheckpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Checkpoint {
    pub thread_id: String,
    /// Position within the thread, starting at 1
    pub seq: i64,
    pub kind: CheckpointKind,
    pub state: ConversationState,
    pub created_at: DateTime<Utc>,
}

/// One line of the thread listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub checkpoints: usize,
    pub turns: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("failed to encode checkpoint state: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("corrupt checkpoint {seq} for thread '{thread_id}': {message}")]
    Corrupt {
        thread_id: String,
        seq: i64,
        message: String,
    },

    #[error("checkpoint store unavailable: {message}")]
    Unavailable { message: String },
}

impl CheckpointError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Storage for conversation snapshots
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Newest state of the thread, or the default state if it has none
    async fn load(&self, thread_id: &str) -> Result<ConversationState, CheckpointError>;

    /// Append a snapshot and return its sequence number
    async fn save(
        &self,
        thread_id: &str,
        state: &ConversationState,
        kind: CheckpointKind,
    ) -> Result<i64, CheckpointError>;

    /// All snapshots of the thread, newest first
    async fn history(&self, thread_id: &str) -> Result<Vec<Checkpoint>, CheckpointError>;

    async fn exists(&self, thread_id: &str) -> Result<bool, CheckpointError>;

    /// Threads with at least one snapshot, most recently updated first
    async fn list_threads(&self) -> Result<Vec<ThreadSummary>, CheckpointError>;

    /// Remove every snapshot of the thread and return how many were removed
    async fn delete_thread(&self, thread_id: &str) -> Result<usize, CheckpointError>;
}
