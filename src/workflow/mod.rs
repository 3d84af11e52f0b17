//! Conversation workflow engine
//!
//! This module handles:
//! - Per-conversation state and its functional updates
//! - Step functions over the injected reasoner and query adapters
//! - Router predicates and the validated step graph
//! - Turn execution with checkpointing
//!
//! # Example
//!
//! ```ignore
//! use vote_inquiry::workflow::{WorkflowExecutor, vote_inquiry_graph};
//!
//! let executor = WorkflowExecutor::new(vote_inquiry_graph()?, step_context, store, durability);
//! let outcome = executor.invoke_turn("thread_abc", "Quantos votos teve Hélio Junior em Campinas?").await?;
//! println!("{}", outcome.answer);
//! ```

mod context_window;
mod executor;
mod graph;
mod routers;
mod state;
mod steps;

#[cfg(test)]
pub(crate) mod testing;

pub use context_window::{Exchange, parse_turns};
pub use executor::{ExecutorError, TurnOutcome, WorkflowExecutor};
pub use graph::{Edge, WorkflowGraph, vote_inquiry_graph};
pub use state::ConversationState;
pub use steps::{LookupColumns, StepContext, StepId};
