//! Two-way branch predicates over the conversation state

use super::state::ConversationState;
use serde::Serialize;
use std::fmt;

/// Scope check passed
pub fn route_by_classification(state: &ConversationState) -> bool {
    state.classification.is_true()
}

/// A step failed earlier in the turn
pub fn look_for_errors(state: &ConversationState) -> bool {
    state.has_error()
}

/// The conversation step asked for more information
pub fn route_by_clarification(state: &ConversationState) -> bool {
    state.need_further_clarification.is_true()
}

/// The entity lookup returned at least one row
pub fn any_entity_found(state: &ConversationState) -> bool {
    !state.entity_lookup_result.is_empty()
}

/// The final query returned at least one row
pub fn check_final_query_result(state: &ConversationState) -> bool {
    !state.final_query_result.is_empty()
}

/// Named router, so branches can be stored and printed as data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Router {
    RouteByClassification,
    LookForErrors,
    RouteByClarification,
    AnyEntityFound,
    CheckFinalQueryResult,
}

impl Router {
    pub fn evaluate(self, state: &ConversationState) -> bool {
        match self {
            Router::RouteByClassification => route_by_classification(state),
            Router::LookForErrors => look_for_errors(state),
            Router::RouteByClarification => route_by_clarification(state),
            Router::AnyEntityFound => any_entity_found(state),
            Router::CheckFinalQueryResult => check_final_query_result(state),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Router::RouteByClassification => "route_by_classification",
            Router::LookForErrors => "look_for_errors",
            Router::RouteByClarification => "route_by_clarification",
            Router::AnyEntityFound => "any_entity_found",
            Router::CheckFinalQueryResult => "check_final_query_result",
        }
    }
}

impl fmt::Display for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
