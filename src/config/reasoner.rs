//! Reasoning service configuration

use serde::{Deserialize, Serialize};

/// Configuration for the OpenAI-compatible reasoning service
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReasonerConfig {
    /// Base URL of the chat-completions API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// API key (takes precedence over `api_key_env`)
    pub api_key: Option<String>,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Timeout in seconds for a single request
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Maximum retry attempts for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay in milliseconds for exponential backoff
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Sampling temperature per call site
    #[serde(default)]
    pub temperature: Temperatures,
}

/// Sampling temperature for each reasoning task
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Temperatures {
    #[serde(default = "low")]
    pub scope_check: f32,
    #[serde(default = "moderate")]
    pub converse: f32,
    #[serde(default)]
    pub entity_lookup: f32,
    #[serde(default = "moderate")]
    pub final_query: f32,
    #[serde(default = "moderate")]
    pub format_answer: f32,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_model() -> String {
    "gpt-4o".into()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}

fn default_timeout() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay() -> u64 {
    1000
}

fn low() -> f32 {
    0.1
}

fn moderate() -> f32 {
    0.2
}

impl Default for Temperatures {
    fn default() -> Self {
        Self {
            scope_check: low(),
            converse: moderate(),
            entity_lookup: 0.0,
            final_query: moderate(),
            format_answer: moderate(),
        }
    }
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            api_key_env: default_api_key_env(),
            timeout: default_timeout(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
            temperature: Temperatures::default(),
        }
    }
}

impl ReasonerConfig {
    /// Resolve the API key from the config or the environment
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|key| !key.trim().is_empty())
    }
}
