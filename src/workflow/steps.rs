//! Step functions
//!
//! A step takes the state by value and returns the next one. Adapter
//! failures are caught here: they raise the turn's error flag and never
//! escape the step.

use super::context_window::{append_turn, count_turns};
use super::state::ConversationState;
use crate::config::{DatabaseConfig, RepliesConfig, Temperatures};
use crate::prompts::{PromptEngine, PromptError};
use crate::query::{QueryExecutor, Row};
use crate::reasoner::{
    ConverseReply, FinalQueryReply, FormattedAnswerReply, LookupQueryReply, Reasoner,
    ReasonerError, ScopeVerdict, StructuredReply, invoke_structured,
};
use async_trait::async_trait;
use minijinja::{Value, context};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Every node of the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    ScopeCheck,
    OutOfScopeReply,
    Converse,
    ErrorReply,
    CheckClarification,
    AskClarification,
    ResolveEntityByAlias,
    CheckAliasLookup,
    ResolveEntityByFormalName,
    CheckFormalNameLookup,
    NoEntityFound,
    BuildFinalQuery,
    RunFinalQuery,
    CheckFinalResult,
    NoDataFound,
    FormatFinalAnswer,
    UpdateContext,
}

impl StepId {
    pub const ALL: [StepId; 17] = [
        StepId::ScopeCheck,
        StepId::OutOfScopeReply,
        StepId::Converse,
        StepId::ErrorReply,
        StepId::CheckClarification,
        StepId::AskClarification,
        StepId::ResolveEntityByAlias,
        StepId::CheckAliasLookup,
        StepId::ResolveEntityByFormalName,
        StepId::CheckFormalNameLookup,
        StepId::NoEntityFound,
        StepId::BuildFinalQuery,
        StepId::RunFinalQuery,
        StepId::CheckFinalResult,
        StepId::NoDataFound,
        StepId::FormatFinalAnswer,
        StepId::UpdateContext,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StepId::ScopeCheck => "scope_check",
            StepId::OutOfScopeReply => "out_of_scope_reply",
            StepId::Converse => "converse",
            StepId::ErrorReply => "error_reply",
            StepId::CheckClarification => "check_clarification",
            StepId::AskClarification => "ask_clarification",
            StepId::ResolveEntityByAlias => "resolve_entity_by_alias",
            StepId::CheckAliasLookup => "check_alias_lookup",
            StepId::ResolveEntityByFormalName => "resolve_entity_by_formal_name",
            StepId::CheckFormalNameLookup => "check_formal_name_lookup",
            StepId::NoEntityFound => "no_entity_found",
            StepId::BuildFinalQuery => "build_final_query",
            StepId::RunFinalQuery => "run_final_query",
            StepId::CheckFinalResult => "check_final_result",
            StepId::NoDataFound => "no_data_found",
            StepId::FormatFinalAnswer => "format_final_answer",
            StepId::UpdateContext => "update_context",
        }
    }

    /// The step function bound to this node
    pub fn step(self) -> &'static dyn Step {
        match self {
            StepId::ScopeCheck => &ScopeCheck,
            StepId::OutOfScopeReply => &CannedReply(Reply::OutOfScope),
            StepId::Converse => &Converse,
            StepId::ErrorReply => &CannedReply(Reply::AppError),
            StepId::AskClarification => &AskClarification,
            StepId::ResolveEntityByAlias => &ResolveEntity(LookupStrategy::Alias),
            StepId::ResolveEntityByFormalName => &ResolveEntity(LookupStrategy::FormalName),
            StepId::NoEntityFound => &CannedReply(Reply::NoEntityFound),
            StepId::BuildFinalQuery => &BuildFinalQuery,
            StepId::RunFinalQuery => &RunFinalQuery,
            StepId::NoDataFound => &CannedReply(Reply::NoDataFound),
            StepId::FormatFinalAnswer => &FormatFinalAnswer,
            StepId::UpdateContext => &UpdateContext,
            StepId::CheckClarification
            | StepId::CheckAliasLookup
            | StepId::CheckFormalNameLookup
            | StepId::CheckFinalResult => &Gate,
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lookup column names in the votes database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupColumns {
    pub alias: String,
    pub formal_name: String,
    pub entity_id: String,
}

impl From<&DatabaseConfig> for LookupColumns {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            alias: config.alias_column.clone(),
            formal_name: config.formal_name_column.clone(),
            entity_id: config.entity_id_column.clone(),
        }
    }
}

impl Default for LookupColumns {
    fn default() -> Self {
        Self::from(&DatabaseConfig::default())
    }
}

/// Everything a step may consult
pub struct StepContext {
    pub reasoner: Arc<dyn Reasoner>,
    pub queries: Arc<dyn QueryExecutor>,
    pub prompts: PromptEngine,
    pub columns: LookupColumns,
    pub replies: RepliesConfig,
    pub temperatures: Temperatures,
}

impl StepContext {
    /// Render the task's prompt and decode the structured reply
    async fn ask<T: StructuredReply>(&self, vars: Value) -> Result<T, StepFailure> {
        let request = self
            .prompts
            .render(T::TASK, &vars)?
            .with_temperature(T::TASK.temperature(&self.temperatures));

        Ok(invoke_structured::<T>(self.reasoner.as_ref(), &request).await?)
    }
}

/// Why a step could not produce its output
#[derive(Debug, Error)]
pub enum StepFailure {
    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Reasoner(#[from] ReasonerError),

    #[error("lookup row has no usable '{column}' value")]
    MissingEntityId { column: String },
}

/// One unit of work in the graph
#[async_trait]
pub trait Step: Send + Sync {
    async fn run(&self, state: ConversationState, ctx: &StepContext) -> ConversationState;
}

/// Classify the message in or out of scope
///
/// A failing classifier lets the message through. Every other adapter
/// failure routes to the error reply instead.
pub struct ScopeCheck;

#[async_trait]
impl Step for ScopeCheck {
    async fn run(&self, state: ConversationState, ctx: &StepContext) -> ConversationState {
        let verdict = ctx
            .ask::<ScopeVerdict>(context! { message => &state.message })
            .await;

        match verdict {
            Ok(verdict) => {
                tracing::info!(in_scope = verdict.is_valid_input, "Scope check");
                state.with_classification(verdict.is_valid_input)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Scope check failed, treating message as in scope");
                state.with_classification(true)
            }
        }
    }
}

/// Extract the search intent and decide whether to ask for more
pub struct Converse;

#[async_trait]
impl Step for Converse {
    async fn run(&self, state: ConversationState, ctx: &StepContext) -> ConversationState {
        let reply = ctx
            .ask::<ConverseReply>(context! {
                message => &state.message,
                context => &state.context,
            })
            .await;

        match reply {
            Ok(reply) => {
                tracing::info!(
                    need_clarification = reply.need_further_clarification,
                    summary = %reply.summary,
                    "Search intent"
                );
                if !reply.notes.is_empty() {
                    tracing::debug!(notes = %reply.notes, "Converse notes");
                }
                state.with_search_intent(
                    reply.need_further_clarification,
                    reply.clarification_question,
                    reply.summary,
                )
            }
            Err(e) => {
                tracing::error!(error = %e, "Converse step failed");
                state.with_error()
            }
        }
    }
}

/// Which canned reply a terminal step sends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    OutOfScope,
    AppError,
    NoEntityFound,
    NoDataFound,
}

impl Reply {
    fn text(self, replies: &RepliesConfig) -> &str {
        match self {
            Reply::OutOfScope => &replies.out_of_scope,
            Reply::AppError => &replies.app_error,
            Reply::NoEntityFound => &replies.no_entity_found,
            Reply::NoDataFound => &replies.no_data_found,
        }
    }
}

pub struct CannedReply(pub Reply);

#[async_trait]
impl Step for CannedReply {
    async fn run(&self, state: ConversationState, ctx: &StepContext) -> ConversationState {
        tracing::info!(reply = ?self.0, "Sending canned reply");
        state.with_answer(self.0.text(&ctx.replies))
    }
}

/// Surface the clarification question as the answer
///
/// A blank question gets the error reply, so the turn never ends unanswered.
pub struct AskClarification;

#[async_trait]
impl Step for AskClarification {
    async fn run(&self, state: ConversationState, ctx: &StepContext) -> ConversationState {
        if state.clarification_question.trim().is_empty() {
            tracing::warn!("Clarification requested without a question");
            return state.with_answer(ctx.replies.app_error.as_str());
        }

        let question = state.clarification_question.clone();
        state.with_answer(question)
    }
}

/// Name attribute an entity lookup searches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStrategy {
    /// The name a candidate is voted under
    Alias,
    /// The candidate's registered name
    FormalName,
}

impl LookupStrategy {
    pub fn column(self, columns: &LookupColumns) -> &str {
        match self {
            LookupStrategy::Alias => &columns.alias,
            LookupStrategy::FormalName => &columns.formal_name,
        }
    }
}

/// Build a lookup query with the reasoner, then run it
pub struct ResolveEntity(pub LookupStrategy);

#[async_trait]
impl Step for ResolveEntity {
    async fn run(&self, state: ConversationState, ctx: &StepContext) -> ConversationState {
        let column = self.0.column(&ctx.columns);

        let lookup = ctx
            .ask::<LookupQueryReply>(context! {
                summary => &state.summary,
                column => column,
                id_column => &ctx.columns.entity_id,
                alias_column => &ctx.columns.alias,
                formal_name_column => &ctx.columns.formal_name,
            })
            .await;

        let query = match lookup {
            Ok(reply) => reply.query,
            Err(e) => {
                tracing::error!(strategy = ?self.0, error = %e, "Failed to build entity lookup");
                return state.with_error();
            }
        };

        let state = state.with_entity_lookup_query(query.clone());
        match ctx.queries.run(&query).await {
            Ok(rows) => {
                tracing::info!(strategy = ?self.0, column, rows = rows.len(), "Entity lookup");
                state.with_entity_lookup_result(rows)
            }
            Err(e) => {
                tracing::error!(strategy = ?self.0, error = %e, query = %query, "Entity lookup failed");
                state.with_error()
            }
        }
    }
}

/// Synthesize the data query for the resolved entity
pub struct BuildFinalQuery;

impl BuildFinalQuery {
    async fn attempt(state: &ConversationState, ctx: &StepContext) -> Result<String, StepFailure> {
        let entity_id = state
            .entity_lookup_result
            .first()
            .and_then(|row| entity_id(row, &ctx.columns.entity_id))
            .ok_or_else(|| StepFailure::MissingEntityId {
                column: ctx.columns.entity_id.clone(),
            })?;

        let reply = ctx
            .ask::<FinalQueryReply>(context! {
                summary => &state.summary,
                id_column => &ctx.columns.entity_id,
                entity_id => entity_id,
            })
            .await?;
        Ok(reply.query)
    }
}

#[async_trait]
impl Step for BuildFinalQuery {
    async fn run(&self, state: ConversationState, ctx: &StepContext) -> ConversationState {
        match Self::attempt(&state, ctx).await {
            Ok(query) => {
                tracing::info!(query = %query, "Built final query");
                state.with_final_query(query)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to build final query");
                state.with_error()
            }
        }
    }
}

/// Id of the first lookup row: the configured column, else the first value
fn entity_id(row: &Row, column: &str) -> Option<String> {
    let value = row.get(column).or_else(|| row.values().next())?;
    let id = match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

/// Execute the data query
pub struct RunFinalQuery;

#[async_trait]
impl Step for RunFinalQuery {
    async fn run(&self, state: ConversationState, ctx: &StepContext) -> ConversationState {
        match ctx.queries.run(&state.final_query).await {
            Ok(rows) => {
                tracing::info!(rows = rows.len(), "Final query");
                state.with_final_query_result(rows)
            }
            Err(e) => {
                tracing::error!(error = %e, query = %state.final_query, "Final query failed");
                state.with_final_query_result(Vec::new()).with_error()
            }
        }
    }
}

/// Turn result rows into prose
pub struct FormatFinalAnswer;

#[async_trait]
impl Step for FormatFinalAnswer {
    async fn run(&self, state: ConversationState, ctx: &StepContext) -> ConversationState {
        let reply = ctx
            .ask::<FormattedAnswerReply>(context! {
                summary => &state.summary,
                rows => &state.final_query_result,
            })
            .await;

        match reply {
            Ok(reply) => state.with_answer(reply.answer),
            Err(e) => {
                tracing::error!(error = %e, "Failed to format answer");
                state.with_error()
            }
        }
    }
}

/// Append the turn to the rolling context
pub struct UpdateContext;

#[async_trait]
impl Step for UpdateContext {
    async fn run(&self, state: ConversationState, _ctx: &StepContext) -> ConversationState {
        let context = append_turn(&state.context, &state.message, state.answer());
        tracing::debug!(turns = count_turns(&context), "Context updated");
        state.with_context(context)
    }
}

/// Pass-through node that only exists to hang a second router on
pub struct Gate;

#[async_trait]
impl Step for Gate {
    async fn run(&self, state: ConversationState, _ctx: &StepContext) -> ConversationState {
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoner::ReasoningTask;
    use crate::workflow::testing::{ScriptedQueries, ScriptedReasoner, rows, step_context};
    use serde_json::json;

    fn turn(message: &str) -> ConversationState {
        ConversationState::default().begin_turn(message)
    }

    #[tokio::test]
    async fn test_scope_check_out_of_scope() {
        let reasoner = ScriptedReasoner::new().reply(
            ReasoningTask::ScopeCheck,
            json!({"isValidInput": false}),
        );
        let ctx = step_context(reasoner, ScriptedQueries::new());

        let state = ScopeCheck.run(turn("Qual a previsão do tempo?"), &ctx).await;
        assert_eq!(state.classification, crate::workflow::state::Assessment::Evaluated(false));
        assert!(!state.has_error());
    }

    #[tokio::test]
    async fn test_scope_check_fails_open() {
        let reasoner = ScriptedReasoner::new().fail(
            ReasoningTask::ScopeCheck,
            ReasonerError::network("connection refused"),
        );
        let ctx = step_context(reasoner, ScriptedQueries::new());

        let state = ScopeCheck.run(turn("Hélio"), &ctx).await;
        assert!(state.classification.is_true());
        assert!(!state.has_error());
    }

    #[tokio::test]
    async fn test_converse_sets_intent() {
        let reasoner = ScriptedReasoner::new().reply(
            ReasoningTask::Converse,
            json!({
                "needFurtherClarification": true,
                "clarificationQuestion": "Em qual cidade?",
                "summary": ""
            }),
        );
        let ctx = step_context(reasoner, ScriptedQueries::new());

        let state = Converse.run(turn("Hélio"), &ctx).await;
        assert!(state.need_further_clarification.is_true());
        assert_eq!(state.clarification_question, "Em qual cidade?");
    }

    #[tokio::test]
    async fn test_converse_schema_mismatch_raises_error() {
        let reasoner =
            ScriptedReasoner::new().reply(ReasoningTask::Converse, json!({"unexpected": 1}));
        let ctx = step_context(reasoner, ScriptedQueries::new());

        let state = Converse.run(turn("Hélio"), &ctx).await;
        assert!(state.has_error());
        assert!(state.summary.is_empty());
    }

    #[tokio::test]
    async fn test_ask_clarification_without_question_sends_error_reply() {
        let ctx = step_context(ScriptedReasoner::new(), ScriptedQueries::new());
        let state = turn("Hélio").with_search_intent(true, "  ", "");

        let next = AskClarification.run(state, &ctx).await;
        assert_eq!(next.answer(), ctx.replies.app_error);
        assert!(!next.has_error());
    }

    #[tokio::test]
    async fn test_resolve_entity_uses_strategy_column() {
        let reasoner = ScriptedReasoner::new().reply(
            ReasoningTask::EntityLookup,
            json!({"getEntityIdQuery": "SELECT sq_candidato FROM candidate WHERE nm_candidato LIKE '%HELIO%'"}),
        );
        let queries = ScriptedQueries::new().returning(rows(json!([{"sq_candidato": "250001"}])));
        let ctx = step_context(reasoner.clone(), queries.clone());

        let state = ResolveEntity(LookupStrategy::FormalName)
            .run(turn("Hélio Junior").with_search_intent(false, "", "Hélio Junior, Campinas"), &ctx)
            .await;

        assert_eq!(state.entity_lookup_result.len(), 1);
        assert!(state.entity_lookup_query.contains("nm_candidato"));
        assert_eq!(queries.queries().len(), 1);
        let request = &reasoner.calls()[0];
        assert!(request.system.iter().any(|s| s.contains("nm_candidato")));
        assert_eq!(request.temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_resolve_entity_reasoner_failure_skips_query() {
        let reasoner = ScriptedReasoner::new().fail(
            ReasoningTask::EntityLookup,
            ReasonerError::timeout(std::time::Duration::from_secs(60)),
        );
        let queries = ScriptedQueries::new();
        let ctx = step_context(reasoner, queries.clone());

        let state = ResolveEntity(LookupStrategy::Alias).run(turn("x"), &ctx).await;
        assert!(state.has_error());
        assert!(queries.queries().is_empty());
    }

    #[tokio::test]
    async fn test_build_final_query_uses_id_column() {
        let reasoner = ScriptedReasoner::new().reply(
            ReasoningTask::FinalQuery,
            json!({"finalQuery": "SELECT SUM(total_votos) FROM votes_by_bairro WHERE sq_candidato = '250001'"}),
        );
        let ctx = step_context(reasoner.clone(), ScriptedQueries::new());
        let state = turn("x").with_entity_lookup_result(rows(json!([
            {"nm_votavel": "HELIO JUNIOR", "sq_candidato": "250001"},
            {"nm_votavel": "OUTRO", "sq_candidato": "999"}
        ])));

        let state = BuildFinalQuery.run(state, &ctx).await;
        assert!(!state.has_error());
        assert!(state.final_query.contains("250001"));
        assert!(reasoner.calls()[0].system[1].contains("250001"));
    }

    #[tokio::test]
    async fn test_build_final_query_without_id_fails() {
        let ctx = step_context(ScriptedReasoner::new(), ScriptedQueries::new());
        let state = turn("x").with_entity_lookup_result(rows(json!([{"sq_candidato": null}])));

        let state = BuildFinalQuery.run(state, &ctx).await;
        assert!(state.has_error());
        assert!(state.final_query.is_empty());
    }

    #[test]
    fn test_entity_id_fallback_to_first_value() {
        let row = rows(json!([{"id": 42, "name": "x"}])).remove(0);
        assert_eq!(entity_id(&row, "sq_candidato"), Some("42".into()));
        assert_eq!(entity_id(&row, "name"), Some("x".into()));
    }

    #[tokio::test]
    async fn test_run_final_query_failure() {
        let queries = ScriptedQueries::new().failing("database is locked");
        let ctx = step_context(ScriptedReasoner::new(), queries);
        let state = turn("x").with_final_query("SELECT 1");

        let state = RunFinalQuery.run(state, &ctx).await;
        assert!(state.has_error());
        assert!(state.final_query_result.is_empty());
    }

    #[tokio::test]
    async fn test_format_final_answer_blank_is_failure() {
        let reasoner =
            ScriptedReasoner::new().reply(ReasoningTask::FormatAnswer, json!({"finalResult": ""}));
        let ctx = step_context(reasoner, ScriptedQueries::new());
        let state = turn("x").with_final_query_result(rows(json!([{"total": 1}])));

        let state = FormatFinalAnswer.run(state, &ctx).await;
        assert!(state.has_error());
        assert_eq!(state.answer(), "");
    }

    #[tokio::test]
    async fn test_canned_replies_come_from_config() {
        let ctx = step_context(ScriptedReasoner::new(), ScriptedQueries::new());

        let state = StepId::OutOfScopeReply.step().run(turn("oi"), &ctx).await;
        assert_eq!(state.answer(), ctx.replies.out_of_scope);

        let state = StepId::NoEntityFound.step().run(turn("oi"), &ctx).await;
        assert_eq!(state.answer(), ctx.replies.no_entity_found);
    }

    #[tokio::test]
    async fn test_update_context_appends_turn() {
        let ctx = step_context(ScriptedReasoner::new(), ScriptedQueries::new());
        let state = turn("Hélio").with_answer("Em qual cidade?");

        let state = UpdateContext.run(state, &ctx).await;
        assert_eq!(state.context, "\nHuman:Hélio\nSystem:Em qual cidade?");
    }

    #[test]
    fn test_step_names_are_unique() {
        let names: std::collections::HashSet<_> = StepId::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(names.len(), StepId::ALL.len());
    }
}
