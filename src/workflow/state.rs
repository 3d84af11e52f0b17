//! Per-conversation state threaded through the graph
//!
//! Steps never mutate a state they were handed: each update consumes the
//! value and returns the next one.

use crate::query::Row;
use serde::{Deserialize, Deserializer, Serialize};

/// A yes/no judgement that may not have been made yet this turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "AssessmentRepr", into = "AssessmentRepr")]
pub enum Assessment {
    #[default]
    NotEvaluated,
    Evaluated(bool),
}

const NOT_EVALUATED: &str = "not_evaluated";

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum AssessmentRepr {
    Flag(bool),
    Marker(String),
}

impl TryFrom<AssessmentRepr> for Assessment {
    type Error = String;

    fn try_from(repr: AssessmentRepr) -> Result<Self, Self::Error> {
        match repr {
            AssessmentRepr::Flag(value) => Ok(Assessment::Evaluated(value)),
            AssessmentRepr::Marker(marker) if marker == NOT_EVALUATED => {
                Ok(Assessment::NotEvaluated)
            }
            AssessmentRepr::Marker(other) => Err(format!(
                "expected true, false or \"{}\", got \"{}\"",
                NOT_EVALUATED, other
            )),
        }
    }
}

impl From<Assessment> for AssessmentRepr {
    fn from(value: Assessment) -> Self {
        match value {
            Assessment::NotEvaluated => AssessmentRepr::Marker(NOT_EVALUATED.into()),
            Assessment::Evaluated(flag) => AssessmentRepr::Flag(flag),
        }
    }
}

impl Assessment {
    /// True only when evaluated and positive
    pub fn is_true(self) -> bool {
        matches!(self, Assessment::Evaluated(true))
    }
}

/// Turn-level failure flag: once raised it stays raised until the next turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StickyFlag(bool);

impl StickyFlag {
    pub fn raise(self) -> Self {
        StickyFlag(true)
    }

    pub fn is_raised(self) -> bool {
        self.0
    }
}

/// The answer shown to the user for a turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalAnswer {
    #[serde(default)]
    pub answer: String,
}

/// State of one conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversationState {
    pub message: String,
    pub classification: Assessment,
    pub context: String,
    pub need_further_clarification: Assessment,
    pub clarification_question: String,
    pub summary: String,
    pub entity_lookup_query: String,
    #[serde(deserialize_with = "rows_or_empty")]
    pub entity_lookup_result: Vec<Row>,
    pub final_query: String,
    #[serde(deserialize_with = "rows_or_empty")]
    pub final_query_result: Vec<Row>,
    pub final_answer: FinalAnswer,
    pub error: StickyFlag,
}

fn rows_or_empty<'de, D>(deserializer: D) -> Result<Vec<Row>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Row>>::deserialize(deserializer)?.unwrap_or_default())
}

impl ConversationState {
    /// Start a new turn from the last persisted state
    ///
    /// Only the rolling context survives; everything else, the error flag
    /// included, returns to its default.
    pub fn begin_turn(self, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: self.context,
            ..Self::default()
        }
    }

    pub fn with_classification(self, in_scope: bool) -> Self {
        Self {
            classification: Assessment::Evaluated(in_scope),
            ..self
        }
    }

    pub fn with_search_intent(
        self,
        need_clarification: bool,
        clarification_question: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            need_further_clarification: Assessment::Evaluated(need_clarification),
            clarification_question: clarification_question.into(),
            summary: summary.into(),
            ..self
        }
    }

    pub fn with_entity_lookup_query(self, query: impl Into<String>) -> Self {
        Self {
            entity_lookup_query: query.into(),
            ..self
        }
    }

    pub fn with_entity_lookup_result(self, rows: Vec<Row>) -> Self {
        Self {
            entity_lookup_result: rows,
            ..self
        }
    }

    pub fn with_final_query(self, query: impl Into<String>) -> Self {
        Self {
            final_query: query.into(),
            ..self
        }
    }

    pub fn with_final_query_result(self, rows: Vec<Row>) -> Self {
        Self {
            final_query_result: rows,
            ..self
        }
    }

    pub fn with_answer(self, answer: impl Into<String>) -> Self {
        Self {
            final_answer: FinalAnswer {
                answer: answer.into(),
            },
            ..self
        }
    }

    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            ..self
        }
    }

    pub fn with_error(self) -> Self {
        Self {
            error: self.error.raise(),
            ..self
        }
    }

    pub fn answer(&self) -> &str {
        &self.final_answer.answer
    }

    pub fn has_error(&self) -> bool {
        self.error.is_raised()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_defaults() {
        let state = ConversationState::default();
        assert_eq!(state.classification, Assessment::NotEvaluated);
        assert_eq!(state.need_further_clarification, Assessment::NotEvaluated);
        assert!(state.entity_lookup_result.is_empty());
        assert!(state.final_query_result.is_empty());
        assert!(!state.has_error());
        assert_eq!(state.answer(), "");
    }

    #[test]
    fn test_serialized_field_names() {
        let state = ConversationState::default().begin_turn("Hélio");
        let value = serde_json::to_value(&state).unwrap();

        assert_eq!(value["message"], "Hélio");
        assert_eq!(value["classification"], "not_evaluated");
        assert_eq!(value["needFurtherClarification"], "not_evaluated");
        assert_eq!(value["entityLookupResult"], json!([]));
        assert_eq!(value["finalAnswer"], json!({"answer": ""}));
        assert_eq!(value["error"], false);
    }

    #[test]
    fn test_assessment_serialization() {
        assert_eq!(
            serde_json::to_value(Assessment::Evaluated(true)).unwrap(),
            json!(true)
        );
        let parsed: Assessment = serde_json::from_value(json!("not_evaluated")).unwrap();
        assert_eq!(parsed, Assessment::NotEvaluated);
        let parsed: Assessment = serde_json::from_value(json!(false)).unwrap();
        assert_eq!(parsed, Assessment::Evaluated(false));

        assert!(serde_json::from_value::<Assessment>(json!("maybe")).is_err());
    }

    #[test]
    fn test_null_rows_load_as_empty() {
        let state: ConversationState = serde_json::from_value(json!({
            "message": "x",
            "entityLookupResult": null,
        }))
        .unwrap();

        assert!(state.entity_lookup_result.is_empty());
        assert!(state.final_query_result.is_empty());
    }

    #[test]
    fn test_error_is_sticky_within_turn() {
        let state = ConversationState::default().with_error();
        assert!(state.has_error());

        // Later successful updates never lower the flag
        let state = state.with_final_query("SELECT 1").with_answer("ok");
        assert!(state.has_error());
        assert!(state.with_error().has_error());
    }

    #[test]
    fn test_begin_turn_keeps_only_context() {
        let previous = ConversationState::default()
            .begin_turn("old")
            .with_classification(true)
            .with_search_intent(false, "", "votos de Hélio Junior")
            .with_entity_lookup_result(vec![row(json!({"sq_candidato": "1"}))])
            .with_answer("resposta")
            .with_context("\nHuman:old\nSystem:resposta")
            .with_error();

        let next = previous.begin_turn("new");

        assert_eq!(next.message, "new");
        assert_eq!(next.context, "\nHuman:old\nSystem:resposta");
        assert_eq!(next.classification, Assessment::NotEvaluated);
        assert!(next.summary.is_empty());
        assert!(next.entity_lookup_result.is_empty());
        assert_eq!(next.answer(), "");
        assert!(!next.has_error());
    }

    #[test]
    fn test_round_trip() {
        let state = ConversationState::default()
            .begin_turn("Quantos votos teve Hélio Junior em Campinas?")
            .with_classification(true)
            .with_search_intent(false, "", "total de votos")
            .with_entity_lookup_query("SELECT sq_candidato FROM candidate")
            .with_entity_lookup_result(vec![row(json!({"sq_candidato": "250001"}))])
            .with_final_query_result(vec![row(json!({"bairro": "CENTRO", "total_votos": 812}))])
            .with_answer("812 votos");

        let text = serde_json::to_string(&state).unwrap();
        let loaded: ConversationState = serde_json::from_str(&text).unwrap();
        assert_eq!(loaded, state);
    }
}
