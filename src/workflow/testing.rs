//! Scripted adapters for workflow tests

use super::steps::{LookupColumns, StepContext};
use crate::config::{RepliesConfig, Temperatures};
use crate::prompts::PromptEngine;
use crate::query::{QueryError, QueryExecutor, Row};
use crate::reasoner::{Reasoner, ReasonerError, ReasonerRequest, ReasonerResponse, ReasoningTask};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Reasoner returning queued replies per task
///
/// Clones share the same queues and call log. A task with nothing queued
/// fails with a schema error.
#[derive(Clone, Default)]
pub struct ScriptedReasoner {
    replies: Arc<Mutex<HashMap<ReasoningTask, VecDeque<Result<Value, ReasonerError>>>>>,
    calls: Arc<Mutex<Vec<ReasonerRequest>>>,
}

impl ScriptedReasoner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a JSON reply for the task
    pub fn reply(self, task: ReasoningTask, value: Value) -> Self {
        self.push(task, Ok(value));
        self
    }

    /// Queue a failure for the task
    pub fn fail(self, task: ReasoningTask, error: ReasonerError) -> Self {
        self.push(task, Err(error));
        self
    }

    fn push(&self, task: ReasoningTask, reply: Result<Value, ReasonerError>) {
        self.replies
            .lock()
            .unwrap()
            .entry(task)
            .or_default()
            .push_back(reply);
    }

    pub fn calls(&self) -> Vec<ReasonerRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, task: ReasoningTask) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.task == task)
            .count()
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn invoke(&self, request: &ReasonerRequest) -> Result<ReasonerResponse, ReasonerError> {
        self.calls.lock().unwrap().push(request.clone());

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&request.task)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| Err(ReasonerError::schema(request.task, "no scripted reply")))?;

        Ok(
            ReasonerResponse::new(reply.to_string(), "scripted".into(), Duration::ZERO)
                .with_structured(reply),
        )
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Query executor returning queued results in order
///
/// Once the queue is empty every query returns no rows.
#[derive(Clone, Default)]
pub struct ScriptedQueries {
    results: Arc<Mutex<VecDeque<Result<Vec<Row>, String>>>>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl ScriptedQueries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn returning(self, rows: Vec<Row>) -> Self {
        self.results.lock().unwrap().push_back(Ok(rows));
        self
    }

    pub fn failing(self, message: &str) -> Self {
        self.results
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for ScriptedQueries {
    async fn run(&self, query: &str) -> Result<Vec<Row>, QueryError> {
        self.queries.lock().unwrap().push(query.to_string());

        match self.results.lock().unwrap().pop_front() {
            Some(Ok(rows)) => Ok(rows),
            Some(Err(message)) => Err(QueryError::Unavailable { message }),
            None => Ok(Vec::new()),
        }
    }
}

/// Rows from a JSON array of objects
pub fn rows(value: Value) -> Vec<Row> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row.as_object().cloned().unwrap())
        .collect()
}

pub fn step_context(reasoner: ScriptedReasoner, queries: ScriptedQueries) -> StepContext {
    StepContext {
        reasoner: Arc::new(reasoner),
        queries: Arc::new(queries),
        prompts: PromptEngine::new().unwrap(),
        columns: LookupColumns::default(),
        replies: RepliesConfig::default(),
        temperatures: Temperatures::default(),
    }
}
