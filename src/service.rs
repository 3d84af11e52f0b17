//! Chat service: validated entry points over the workflow executor
//!
//! Turns on the same thread are serialized; turns on different threads run
//! independently.

use crate::checkpoint::{CheckpointError, ConversationView, ThreadSummary};
use crate::workflow::{ExecutorError, TurnOutcome, WorkflowExecutor};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

pub const MAX_MESSAGE_CHARS: usize = 5000;

static THREAD_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^thread_[A-Za-z0-9_-]+$").expect("thread id pattern is valid"));

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid thread id '{0}': expected thread_<id>")]
    InvalidThreadId(String),

    #[error("message is required")]
    EmptyMessage,

    #[error("message too long: {length} characters (max {max})")]
    MessageTooLong { length: usize, max: usize },

    #[error("thread '{0}' not found")]
    ThreadNotFound(String),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewThread {
    pub thread_id: String,
    pub created_at: DateTime<Utc>,
}

/// One async mutex per thread id
#[derive(Default)]
struct ThreadLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ThreadLocks {
    async fn acquire(&self, thread_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries nobody holds or waits on can go
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(thread_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

pub struct ChatService {
    executor: WorkflowExecutor,
    locks: ThreadLocks,
}

impl ChatService {
    pub fn new(executor: WorkflowExecutor) -> Self {
        Self {
            executor,
            locks: ThreadLocks::default(),
        }
    }

    pub fn executor(&self) -> &WorkflowExecutor {
        &self.executor
    }

    /// Allocate a fresh thread id; nothing is stored until the first message
    pub fn new_thread(&self) -> NewThread {
        let thread = NewThread {
            thread_id: format!("thread_{}", uuid::Uuid::new_v4()),
            created_at: Utc::now(),
        };
        tracing::info!(thread_id = %thread.thread_id, "Created thread");
        thread
    }

    /// Run one turn on the thread
    pub async fn send_message(
        &self,
        thread_id: &str,
        message: &str,
    ) -> Result<TurnOutcome, ServiceError> {
        validate_thread_id(thread_id)?;
        let message = validate_message(message)?;

        let _guard = self.locks.acquire(thread_id).await;
        Ok(self.executor.invoke_turn(thread_id, message).await?)
    }

    pub async fn threads(&self) -> Result<Vec<ThreadSummary>, ServiceError> {
        Ok(self.executor.store().list_threads().await?)
    }

    pub async fn conversation(&self, thread_id: &str) -> Result<ConversationView, ServiceError> {
        validate_thread_id(thread_id)?;

        let history = self.executor.store().history(thread_id).await?;
        ConversationView::from_history(thread_id, &history)
            .ok_or_else(|| ServiceError::ThreadNotFound(thread_id.to_string()))
    }

    /// Remove every checkpoint of the thread
    pub async fn delete_thread(&self, thread_id: &str) -> Result<usize, ServiceError> {
        validate_thread_id(thread_id)?;

        let _guard = self.locks.acquire(thread_id).await;
        let store = self.executor.store();
        if !store.exists(thread_id).await? {
            return Err(ServiceError::ThreadNotFound(thread_id.to_string()));
        }
        Ok(store.delete_thread(thread_id).await?)
    }
}

pub fn validate_thread_id(thread_id: &str) -> Result<(), ServiceError> {
    if THREAD_ID.is_match(thread_id) {
        Ok(())
    } else {
        Err(ServiceError::InvalidThreadId(thread_id.to_string()))
    }
}

/// Trim the message and check its length
pub fn validate_message(message: &str) -> Result<&str, ServiceError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(ServiceError::EmptyMessage);
    }

    let length = message.chars().count();
    if length > MAX_MESSAGE_CHARS {
        return Err(ServiceError::MessageTooLong {
            length,
            max: MAX_MESSAGE_CHARS,
        });
    }

    Ok(message)
}
