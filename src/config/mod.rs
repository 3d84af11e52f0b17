//! Configuration types and loading for vote-inquiry

mod loader;
mod reasoner;
mod replies;
mod storage;

pub use loader::AppConfig;
pub use reasoner::{ReasonerConfig, Temperatures};
pub use replies::RepliesConfig;
pub use storage::{CheckpointConfig, DatabaseConfig, Durability};
