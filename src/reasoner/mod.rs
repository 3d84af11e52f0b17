//! Reasoning service adapter
//!
//! Provides the `Reasoner` trait consumed by the workflow steps, an
//! OpenAI-compatible HTTP implementation, bounded retries, and the typed
//! response shapes each call site expects.
//!
//! # Example
//!
//! ```ignore
//! use vote_inquiry::reasoner::{HttpReasoner, RetryPolicy, RetryReasoner, ScopeVerdict};
//!
//! let reasoner = RetryReasoner::new(HttpReasoner::from_config(&config)?, RetryPolicy::default());
//! let request = ReasonerRequest::new(ReasoningTask::ScopeCheck, "Quantos votos teve João?");
//! let verdict: ScopeVerdict = invoke_structured(&reasoner, &request).await?;
//! ```

mod http;
mod output_parser;
mod retry;
mod structured;
mod types;

pub use http::HttpReasoner;
pub use retry::RetryReasoner;
pub use structured::{
    ConverseReply, FinalQueryReply, FormattedAnswerReply, LookupQueryReply, ScopeVerdict,
    StructuredReply, invoke_structured,
};
pub use types::{Reasoner, ReasonerError, ReasonerRequest, ReasoningTask, RetryPolicy};
#[cfg(test)]
pub use types::ReasonerResponse;

use crate::config::ReasonerConfig;

/// Build the production reasoner: HTTP client wrapped in bounded retries
pub fn create_reasoner(config: &ReasonerConfig) -> Result<Box<dyn Reasoner>, ReasonerError> {
    let http = HttpReasoner::from_config(config)?;
    if config.resolve_api_key().is_none() {
        tracing::warn!(
            env = %config.api_key_env,
            "No API key configured for the reasoner"
        );
    }
    Ok(Box::new(RetryReasoner::new(
        http,
        RetryPolicy::from_config(config),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_reasoner() {
        let config = ReasonerConfig {
            api_key: Some("sk-test".into()),
            ..Default::default()
        };
        let reasoner = create_reasoner(&config).unwrap();
        assert_eq!(reasoner.name(), "openai");
    }
}
