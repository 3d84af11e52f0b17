//! OpenAI-compatible HTTP reasoner

use super::types::{Reasoner, ReasonerError, ReasonerRequest, ReasonerResponse, TokenUsage};
use crate::config::ReasonerConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Reasoner backed by a chat-completions endpoint
#[derive(Debug, Clone)]
pub struct HttpReasoner {
    name: String,
    base_url: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

impl HttpReasoner {
    /// Create a reasoner from config
    pub fn from_config(config: &ReasonerConfig) -> Result<Self, ReasonerError> {
        let timeout = Duration::from_secs(config.timeout);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReasonerError::Config {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            name: "openai".into(),
            base_url: config.base_url.clone(),
            api_key: config.resolve_api_key(),
            model: config.model.clone(),
            timeout,
            client,
        })
    }

    fn chat_completion_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Map HTTP status to ReasonerError
    fn map_http_error(&self, status: reqwest::StatusCode, body: &str) -> ReasonerError {
        match status.as_u16() {
            401 | 403 => ReasonerError::auth(format!("HTTP {}: {}", status, body)),
            429 => ReasonerError::rate_limit(parse_retry_after(body)),
            408 | 504 => ReasonerError::timeout(self.timeout),
            400..=499 => ReasonerError::Config {
                message: format!("HTTP {}: {}", status, body),
            },
            _ => ReasonerError::network(format!("HTTP {}: {}", status, body)),
        }
    }

    fn build_body(&self, request: &ReasonerRequest) -> ChatCompletionRequest {
        let mut messages: Vec<Message> = request
            .system
            .iter()
            .map(|content| Message {
                role: "system",
                content: content.clone(),
            })
            .collect();

        messages.push(Message {
            role: "user",
            content: request.prompt.clone(),
        });

        ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: request.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        }
    }
}

/// Look for a `retry_after` field (seconds) in an error body
fn parse_retry_after(body: &str) -> Option<Duration> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("retry_after")?
        .as_f64()
        .map(Duration::from_secs_f64)
}

/// The endpoint runs in JSON mode, so a well-formed reply is one object
fn json_object(text: &str) -> Option<serde_json::Value> {
    serde_json::from_str::<serde_json::Value>(text.trim())
        .ok()
        .filter(serde_json::Value::is_object)
}

#[async_trait]
impl Reasoner for HttpReasoner {
    async fn invoke(&self, request: &ReasonerRequest) -> Result<ReasonerResponse, ReasonerError> {
        let start = Instant::now();

        let mut http_request = self
            .client
            .post(self.chat_completion_url())
            .json(&self.build_body(request));

        if let Some(ref key) = self.api_key {
            http_request = http_request.bearer_auth(key);
        }

        let result = tokio::time::timeout(self.timeout, http_request.send()).await;
        let elapsed = start.elapsed();

        let response = match result {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_timeout() => return Err(ReasonerError::timeout(elapsed)),
            Ok(Err(e)) if e.is_connect() => {
                return Err(ReasonerError::network(format!("connection failed: {}", e)));
            }
            Ok(Err(e)) => return Err(ReasonerError::network(format!("request failed: {}", e))),
            Err(_) => return Err(ReasonerError::timeout(elapsed)),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.map_http_error(status, &body));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ReasonerError::parse(format!("failed to parse response: {}", e)))?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        tracing::debug!(
            reasoner = %self.name,
            task = %request.task,
            duration_ms = elapsed.as_millis() as u64,
            "Reasoner responded"
        );

        let mut reasoner_response = ReasonerResponse::new(text, self.name.clone(), elapsed);
        if let Some(structured) = json_object(&reasoner_response.text) {
            reasoner_response = reasoner_response.with_structured(structured);
        }
        if let Some(model) = completion.model {
            reasoner_response = reasoner_response.with_model(model);
        }
        if let Some(usage) = completion.usage {
            reasoner_response = reasoner_response.with_usage(TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            });
        }

        Ok(reasoner_response)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
