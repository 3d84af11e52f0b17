//! CLI module for vote-inquiry
//!
//! This module provides:
//! - Command implementations (send, chat, threads, show, delete, graph)
//! - Output handlers (console, JSON, quiet)
//! - Signal handling for the interactive session
//!
//! # Example
//!
//! ```ignore
//! use vote_inquiry::cli::{commands, output};
//!
//! let handler = output::create_handler(output::OutputMode::Console, false);
//! let exit_code = commands::send(&service, "thread_abc", "Quantos votos teve Hélio?", &*handler).await;
//! ```

pub mod commands;
pub mod output;
pub mod signals;

pub use output::{OutputMode, create_handler};
pub use signals::shutdown_signal;
