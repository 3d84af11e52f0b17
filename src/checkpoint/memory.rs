//! Process-local checkpoint store for ephemeral sessions

use super::{Checkpoint, CheckpointError, CheckpointKind, CheckpointStore, ThreadSummary};
use crate::workflow::ConversationState;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Keeps checkpoints in memory; everything is lost when the process exits
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    threads: RwLock<HashMap<String, Vec<Checkpoint>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, thread_id: &str) -> Result<ConversationState, CheckpointError> {
        let threads = self.threads.read().await;
        Ok(threads
            .get(thread_id)
            .and_then(|history| history.last())
            .map(|checkpoint| checkpoint.state.clone())
            .unwrap_or_default())
    }

    async fn save(
        &self,
        thread_id: &str,
        state: &ConversationState,
        kind: CheckpointKind,
    ) -> Result<i64, CheckpointError> {
        let mut threads = self.threads.write().await;
        let history = threads.entry(thread_id.to_string()).or_default();
        let seq = history.last().map(|c| c.seq).unwrap_or(0) + 1;

        history.push(Checkpoint {
            thread_id: thread_id.to_string(),
            seq,
            kind,
            state: state.clone(),
            created_at: Utc::now(),
        });
        Ok(seq)
    }

    async fn history(&self, thread_id: &str) -> Result<Vec<Checkpoint>, CheckpointError> {
        let threads = self.threads.read().await;
        Ok(threads
            .get(thread_id)
            .map(|history| history.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn exists(&self, thread_id: &str) -> Result<bool, CheckpointError> {
        Ok(self.threads.read().await.contains_key(thread_id))
    }

    async fn list_threads(&self) -> Result<Vec<ThreadSummary>, CheckpointError> {
        let threads = self.threads.read().await;
        let mut summaries: Vec<ThreadSummary> = threads
            .iter()
            .filter_map(|(thread_id, history)| {
                let first = history.first()?;
                let last = history.last()?;
                Some(ThreadSummary {
                    thread_id: thread_id.clone(),
                    checkpoints: history.len(),
                    turns: history
                        .iter()
                        .filter(|c| c.kind == CheckpointKind::Turn)
                        .count(),
                    created_at: first.created_at,
                    updated_at: last.created_at,
                })
            })
            .collect();

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<usize, CheckpointError> {
        let removed = self
            .threads
            .write()
            .await
            .remove(thread_id)
            .map(|history| history.len())
            .unwrap_or(0);
        Ok(removed)
    }
}
