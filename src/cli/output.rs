//! Output handlers for CLI commands
//!
//! Supports console (pretty), JSON, and quiet output modes.

use crate::checkpoint::{ConversationView, Role, ThreadSummary};
use crate::workflow::{ConversationState, Edge, StepId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{self, Write};

/// Output mode for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Console,
    Json,
    Quiet,
}

impl OutputMode {
    /// Pick the mode from the global flags; `--json` wins over `--quiet`
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if json {
            Self::Json
        } else if quiet {
            Self::Quiet
        } else {
            Self::Console
        }
    }
}

/// Events emitted by CLI commands
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputEvent {
    ThreadCreated {
        thread_id: String,
        created_at: DateTime<Utc>,
    },
    Turn {
        thread_id: String,
        answer: String,
        path: Vec<StepId>,
        duration_ms: u64,
        state: ConversationState,
    },
    Threads {
        threads: Vec<ThreadSummary>,
    },
    Conversation {
        conversation: ConversationView,
    },
    ThreadDeleted {
        thread_id: String,
        checkpoints: usize,
    },
    Graph {
        entry: StepId,
        edges: Vec<Edge>,
    },
    Info {
        message: String,
    },
    Error {
        error: String,
    },
}

/// Output handler trait
pub trait OutputHandler: Send + Sync {
    /// Emit an event
    fn emit(&self, event: OutputEvent);

    /// Show the interactive prompt, if the mode has one
    fn prompt(&self) {}
}

/// Human-readable output
pub struct ConsoleHandler {
    debug: bool,
}

impl ConsoleHandler {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    fn format_duration(ms: u64) -> String {
        if ms < 1000 {
            format!("{}ms", ms)
        } else {
            format!("{:.1}s", ms as f64 / 1000.0)
        }
    }

    fn format_edge(edge: &Edge) -> String {
        let target = edge
            .to
            .map(|step| step.to_string())
            .unwrap_or_else(|| "END".into());
        match (edge.router, edge.when) {
            (Some(router), Some(when)) => {
                format!("{} --[{} = {}]--> {}", edge.from, router, when, target)
            }
            _ => format!("{} --> {}", edge.from, target),
        }
    }
}

impl OutputHandler for ConsoleHandler {
    fn emit(&self, event: OutputEvent) {
        match event {
            OutputEvent::ThreadCreated { thread_id, .. } => {
                println!("{}", thread_id);
            }
            OutputEvent::Turn {
                answer,
                path,
                duration_ms,
                ..
            } => {
                if self.debug {
                    let steps: Vec<&str> = path.iter().map(|step| step.name()).collect();
                    eprintln!(
                        "[debug] {} ({})",
                        steps.join(" -> "),
                        Self::format_duration(duration_ms)
                    );
                }
                println!("{}", answer);
            }
            OutputEvent::Threads { threads } => {
                if threads.is_empty() {
                    println!("(no threads)");
                }
                for thread in threads {
                    println!(
                        "{}  {} turn(s)  last active {}",
                        thread.thread_id,
                        thread.turns,
                        thread.updated_at.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
            OutputEvent::Conversation { conversation } => {
                for message in &conversation.messages {
                    let who = match message.role {
                        Role::User => "you",
                        Role::Assistant => "assistant",
                    };
                    println!("{:>9}: {}", who, message.content);
                }
                eprintln!(
                    "({} checkpoint(s), {} to {})",
                    conversation.checkpoint_count,
                    conversation.created_at.format("%Y-%m-%d %H:%M:%S"),
                    conversation.updated_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
            OutputEvent::ThreadDeleted {
                thread_id,
                checkpoints,
            } => {
                eprintln!("✓ Deleted {} ({} checkpoint(s))", thread_id, checkpoints);
            }
            OutputEvent::Graph { entry, edges } => {
                println!("entry: {}", entry);
                for edge in &edges {
                    println!("  {}", Self::format_edge(edge));
                }
            }
            OutputEvent::Info { message } => {
                eprintln!("{}", message);
            }
            OutputEvent::Error { error } => {
                eprintln!("Error: {}", error);
            }
        }
    }

    fn prompt(&self) {
        eprint!("> ");
        let _ = io::stderr().flush();
    }
}

/// One JSON document per event on stdout
pub struct JsonHandler {
    pretty: bool,
}

impl JsonHandler {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl OutputHandler for JsonHandler {
    fn emit(&self, event: OutputEvent) {
        let json = if self.pretty {
            serde_json::to_string_pretty(&event)
        } else {
            serde_json::to_string(&event)
        };

        match json {
            Ok(s) => println!("{}", s),
            Err(e) => tracing::error!(error = %e, "Failed to serialize output event"),
        }
    }
}

/// Prints answers and ids only
pub struct QuietHandler;

impl OutputHandler for QuietHandler {
    fn emit(&self, event: OutputEvent) {
        match event {
            OutputEvent::ThreadCreated { thread_id, .. } => println!("{}", thread_id),
            OutputEvent::Turn { answer, .. } => println!("{}", answer),
            OutputEvent::Error { error } => eprintln!("Error: {}", error),
            _ => {}
        }
    }
}

/// Create an output handler based on mode
pub fn create_handler(mode: OutputMode, debug: bool) -> Box<dyn OutputHandler> {
    match mode {
        OutputMode::Console => Box::new(ConsoleHandler::new(debug)),
        OutputMode::Json => Box::new(JsonHandler::new(true)),
        OutputMode::Quiet => Box::new(QuietHandler),
    }
}
