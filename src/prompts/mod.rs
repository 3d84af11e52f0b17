//! Prompt templates for the reasoning service
//!
//! Each reasoning task owns a set of minijinja templates: ordered system
//! messages plus the user message. Steps supply a context built with
//! `minijinja::context!` and get back a `ReasonerRequest`.

mod engine;
mod errors;
mod filters;
mod templates;

pub use engine::PromptEngine;
pub use errors::PromptError;
