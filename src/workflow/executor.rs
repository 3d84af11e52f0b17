//! Runs one conversation turn through the graph

use super::graph::WorkflowGraph;
use super::state::ConversationState;
use super::steps::{StepContext, StepId};
use crate::checkpoint::{CheckpointError, CheckpointKind, CheckpointStore};
use crate::config::Durability;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::Instrument;

/// Infrastructure failures; step failures never surface here
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("failed to load thread '{thread_id}': {source}")]
    Load {
        thread_id: String,
        #[source]
        source: CheckpointError,
    },

    #[error("failed to save thread '{thread_id}': {source}")]
    Save {
        thread_id: String,
        #[source]
        source: CheckpointError,
    },
}

/// Result of one turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub answer: String,
    pub state: ConversationState,
    /// Steps visited, in order
    pub path: Vec<StepId>,
    pub elapsed: Duration,
}

/// Drives a validated graph over injected adapters
///
/// One call to [`WorkflowExecutor::invoke_turn`] loads the thread, walks a
/// single path from the entry step to a terminal, and saves the result.
/// Callers must not run two turns of the same thread at once.
pub struct WorkflowExecutor {
    graph: WorkflowGraph,
    ctx: StepContext,
    store: Arc<dyn CheckpointStore>,
    durability: Durability,
}

impl WorkflowExecutor {
    pub fn new(
        graph: WorkflowGraph,
        ctx: StepContext,
        store: Arc<dyn CheckpointStore>,
        durability: Durability,
    ) -> Self {
        Self {
            graph,
            ctx,
            store,
            durability,
        }
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    pub async fn invoke_turn(
        &self,
        thread_id: &str,
        message: &str,
    ) -> Result<TurnOutcome, ExecutorError> {
        let span = tracing::info_span!("turn", thread_id = %thread_id);
        self.run_turn(thread_id, message).instrument(span).await
    }

    async fn run_turn(&self, thread_id: &str, message: &str) -> Result<TurnOutcome, ExecutorError> {
        let start = Instant::now();

        let previous = self
            .store
            .load(thread_id)
            .await
            .map_err(|source| ExecutorError::Load {
                thread_id: thread_id.to_string(),
                source,
            })?;

        let mut state = previous.begin_turn(message);
        let mut path = Vec::new();
        let mut current = Some(self.graph.entry());

        while let Some(step) = current {
            tracing::debug!(step = %step, "Running step");
            state = step.step().run(state, &self.ctx).await;
            path.push(step);

            if self.durability == Durability::EveryStep {
                self.save(thread_id, &state, CheckpointKind::Step).await?;
            }

            current = self.graph.next(step, &state);
        }

        if state.answer().trim().is_empty() {
            tracing::warn!(last_step = ?path.last(), "Turn ended without an answer");
            state = state.with_answer(self.ctx.replies.app_error.as_str());
        }

        self.save(thread_id, &state, CheckpointKind::Turn).await?;

        let elapsed = start.elapsed();
        tracing::info!(
            steps = path.len(),
            last_step = ?path.last(),
            error = state.has_error(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Turn complete"
        );

        Ok(TurnOutcome {
            answer: state.answer().to_string(),
            state,
            path,
            elapsed,
        })
    }

    async fn save(
        &self,
        thread_id: &str,
        state: &ConversationState,
        kind: CheckpointKind,
    ) -> Result<(), ExecutorError> {
        let seq = self
            .store
            .save(thread_id, state, kind)
            .await
            .map_err(|source| ExecutorError::Save {
                thread_id: thread_id.to_string(),
                source,
            })?;
        tracing::trace!(seq, kind = %kind, "Saved checkpoint");
        Ok(())
    }
}
