//! Core types and traits for the reasoning service

use crate::config::{ReasonerConfig, Temperatures};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Error types that can occur while consulting the reasoner
#[derive(Debug, Clone, Error)]
pub enum ReasonerError {
    /// Request timed out
    #[error("timeout after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// Rate limited by the provider
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimit { retry_after: Option<Duration> },

    /// Authentication failed
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// Network error
    #[error("network error: {message}")]
    Network { message: String },

    /// Failed to parse the transport payload
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Response did not match the shape the call site expects
    #[error("{task} response did not match schema: {message}")]
    Schema { task: ReasoningTask, message: String },

    /// Invalid configuration
    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl ReasonerError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReasonerError::Timeout { .. }
                | ReasonerError::RateLimit { .. }
                | ReasonerError::Network { .. }
        )
    }

    /// Get suggested retry delay for rate limit errors
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ReasonerError::RateLimit { retry_after } => *retry_after,
            _ => None,
        }
    }

    pub fn timeout(elapsed: Duration) -> Self {
        Self::Timeout { elapsed }
    }

    pub fn rate_limit(retry_after: Option<Duration>) -> Self {
        Self::RateLimit { retry_after }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn schema(task: ReasoningTask, message: impl Into<String>) -> Self {
        Self::Schema {
            task,
            message: message.into(),
        }
    }
}

/// The call sites that consult the reasoner, each expecting its own response shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningTask {
    ScopeCheck,
    Converse,
    EntityLookup,
    FinalQuery,
    FormatAnswer,
}

impl ReasoningTask {
    pub const ALL: [ReasoningTask; 5] = [
        ReasoningTask::ScopeCheck,
        ReasoningTask::Converse,
        ReasoningTask::EntityLookup,
        ReasoningTask::FinalQuery,
        ReasoningTask::FormatAnswer,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ReasoningTask::ScopeCheck => "scope_check",
            ReasoningTask::Converse => "converse",
            ReasoningTask::EntityLookup => "entity_lookup",
            ReasoningTask::FinalQuery => "final_query",
            ReasoningTask::FormatAnswer => "format_answer",
        }
    }

    /// Sampling temperature configured for this task
    pub fn temperature(self, t: &Temperatures) -> f32 {
        match self {
            ReasoningTask::ScopeCheck => t.scope_check,
            ReasoningTask::Converse => t.converse,
            ReasoningTask::EntityLookup => t.entity_lookup,
            ReasoningTask::FinalQuery => t.final_query,
            ReasoningTask::FormatAnswer => t.format_answer,
        }
    }
}

impl fmt::Display for ReasoningTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Response from the reasoner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonerResponse {
    /// Raw text output
    pub text: String,

    /// Structured payload, when the adapter already decoded one
    pub structured: Option<serde_json::Value>,

    /// Reasoner name that produced this response
    pub backend: String,

    /// Model used (if known)
    pub model: Option<String>,

    /// Time taken to execute
    pub duration: Duration,

    /// Token usage (if available)
    pub usage: Option<TokenUsage>,
}

/// Token usage information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

impl ReasonerResponse {
    pub fn new(text: String, backend: String, duration: Duration) -> Self {
        Self {
            text,
            structured: None,
            backend,
            model: None,
            duration,
            usage: None,
        }
    }

    pub fn with_structured(mut self, structured: serde_json::Value) -> Self {
        self.structured = Some(structured);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// A single reasoning request
#[derive(Debug, Clone)]
pub struct ReasonerRequest {
    /// Call site issuing the request
    pub task: ReasoningTask,

    /// Instructions sent as system messages, in order
    pub system: Vec<String>,

    /// The human message
    pub prompt: String,

    pub temperature: Option<f32>,
}

impl ReasonerRequest {
    pub fn new(task: ReasoningTask, prompt: impl Into<String>) -> Self {
        Self {
            task,
            system: Vec::new(),
            prompt: prompt.into(),
            temperature: None,
        }
    }

    /// Append a system message (blank ones are skipped)
    pub fn with_system(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        if !message.trim().is_empty() {
            self.system.push(message);
        }
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Trait for reasoning service adapters
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Send a request to the reasoning service
    async fn invoke(&self, request: &ReasonerRequest) -> Result<ReasonerResponse, ReasonerError>;

    /// Get the reasoner name
    fn name(&self) -> &str;
}

#[async_trait]
impl Reasoner for Box<dyn Reasoner> {
    async fn invoke(&self, request: &ReasonerRequest) -> Result<ReasonerResponse, ReasonerError> {
        (**self).invoke(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries
    pub max_retries: u32,

    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,

    /// Whether to add jitter to delays
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ReasonerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.retry_delay_ms),
            ..Default::default()
        }
    }

    /// Calculate delay for a given attempt number
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay.as_secs_f64());

        let final_delay = if self.jitter {
            // Up to 25% jitter
            capped_delay + rand::random::<f64>() * 0.25 * capped_delay
        } else {
            capped_delay
        };

        Duration::from_secs_f64(final_delay)
    }
}
