//! Typed response shapes expected at each call site

use super::output_parser::extract_object;
use super::types::{Reasoner, ReasonerError, ReasonerRequest, ReasoningTask};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

/// A response shape bound to the task that produces it
pub trait StructuredReply: DeserializeOwned {
    const TASK: ReasoningTask;

    /// Reject replies that parse but carry nothing usable
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Scope classification verdict
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeVerdict {
    pub is_valid_input: bool,
}

/// Search intent extracted from the conversation
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverseReply {
    pub need_further_clarification: bool,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub clarification_question: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub notes: String,
}

/// Query text resolving a candidate id
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LookupQueryReply {
    #[serde(rename = "getEntityIdQuery", alias = "query")]
    pub query: String,
}

/// Query text fetching the vote figures
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FinalQueryReply {
    #[serde(rename = "finalQuery", alias = "query")]
    pub query: String,
}

/// Result rows rendered as prose
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FormattedAnswerReply {
    #[serde(rename = "finalResult")]
    pub answer: String,
}

impl StructuredReply for ScopeVerdict {
    const TASK: ReasoningTask = ReasoningTask::ScopeCheck;
}

impl StructuredReply for ConverseReply {
    const TASK: ReasoningTask = ReasoningTask::Converse;
}

impl StructuredReply for LookupQueryReply {
    const TASK: ReasoningTask = ReasoningTask::EntityLookup;

    fn check(&self) -> Result<(), String> {
        non_blank(&self.query, "getEntityIdQuery")
    }
}

impl StructuredReply for FinalQueryReply {
    const TASK: ReasoningTask = ReasoningTask::FinalQuery;

    fn check(&self) -> Result<(), String> {
        non_blank(&self.query, "finalQuery")
    }
}

impl StructuredReply for FormattedAnswerReply {
    const TASK: ReasoningTask = ReasoningTask::FormatAnswer;

    fn check(&self) -> Result<(), String> {
        non_blank(&self.answer, "finalResult")
    }
}

fn non_blank(value: &str, field: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("field `{}` is empty", field))
    } else {
        Ok(())
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Invoke the reasoner and decode its reply into the shape `T`
///
/// A reply that is not JSON, misses a field, or fails `check` is a failure,
/// never a partial result.
pub async fn invoke_structured<T: StructuredReply>(
    reasoner: &dyn Reasoner,
    request: &ReasonerRequest,
) -> Result<T, ReasonerError> {
    let response = reasoner.invoke(request).await?;

    let value = response
        .structured
        .or_else(|| extract_object(&response.text))
        .ok_or_else(|| ReasonerError::schema(T::TASK, "no JSON object in response"))?;

    let reply: T =
        serde_json::from_value(value).map_err(|e| ReasonerError::schema(T::TASK, e.to_string()))?;
    reply
        .check()
        .map_err(|message| ReasonerError::schema(T::TASK, message))?;

    Ok(reply)
}
