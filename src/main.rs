mod checkpoint;
mod cli;
mod config;
mod logging;
mod prompts;
mod query;
mod reasoner;
mod service;
mod workflow;

use anyhow::{Context, Result};
use checkpoint::{CheckpointStore, InMemoryCheckpointStore, SqliteCheckpointStore};
use clap::{Parser, Subcommand};
use cli::commands;
use config::AppConfig;
use prompts::PromptEngine;
use query::SqliteQueryExecutor;
use service::ChatService;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use workflow::{LookupColumns, StepContext, WorkflowExecutor, vote_inquiry_graph};

#[derive(Parser)]
#[command(name = "vote-inquiry")]
#[command(about = "Ask about vote counts in plain language")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (layered over the user and project configs)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Suppress normal output
    #[arg(long, global = true)]
    quiet: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Keep checkpoints in memory for this process only
    #[arg(long, global = true)]
    ephemeral: bool,

    /// Print results (including full conversation state) as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Allocate a new thread id
    NewThread,

    /// Send one message to a thread
    Send {
        /// Thread id (thread_<id>)
        thread: String,

        /// Message text
        #[arg(required = true, trailing_var_arg = true)]
        message: Vec<String>,
    },

    /// Interactive session, one message per line
    Chat {
        /// Resume this thread instead of starting a new one
        #[arg(long)]
        thread: Option<String>,
    },

    /// List stored threads
    Threads,

    /// Show a thread's transcript
    Show {
        thread: String,
    },

    /// Delete a thread and all its checkpoints
    Delete {
        thread: String,
    },

    /// Print the step graph
    Graph,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = logging::init_logging(cli.debug, cli.quiet, cli.log_file.as_deref())?;
    let handler = cli::create_handler(cli::OutputMode::from_flags(cli.json, cli.quiet), cli.debug);

    if let Commands::Graph = cli.command {
        let graph = vote_inquiry_graph().context("building the step graph")?;
        commands::show_graph(&graph, &*handler);
        return Ok(());
    }

    let config = AppConfig::load(cli.config.as_deref())?;
    let service = build_service(&config, cli.ephemeral)?;

    let code = match cli.command {
        Commands::NewThread => commands::new_thread(&service, &*handler),
        Commands::Send { thread, message } => {
            commands::send(&service, &thread, &message.join(" "), &*handler).await
        }
        Commands::Chat { thread } => {
            let input = tokio::io::BufReader::new(tokio::io::stdin());
            commands::chat(&service, thread, input, cli::shutdown_signal(), &*handler).await
        }
        Commands::Threads => commands::list_threads(&service, &*handler).await,
        Commands::Show { thread } => commands::show_thread(&service, &thread, &*handler).await,
        Commands::Delete { thread } => commands::delete_thread(&service, &thread, &*handler).await,
        Commands::Graph => commands::show_graph(service.executor().graph(), &*handler),
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Wire the adapters, prompts and graph into a chat service
fn build_service(config: &AppConfig, ephemeral: bool) -> Result<ChatService> {
    let reasoner = reasoner::create_reasoner(&config.reasoner).context("creating the reasoner")?;

    let database = config.database.resolved_path();
    let queries = SqliteQueryExecutor::open(
        &database,
        Duration::from_millis(config.database.busy_timeout_ms),
    )
    .with_context(|| format!("opening votes database {}", database.display()))?;

    let store: Arc<dyn CheckpointStore> = if ephemeral {
        tracing::info!("Using in-memory checkpoints");
        Arc::new(InMemoryCheckpointStore::new())
    } else {
        let path = config.checkpoints.resolved_path()?;
        tracing::debug!(path = %path.display(), "Opening checkpoint store");
        Arc::new(
            SqliteCheckpointStore::open(&path)
                .with_context(|| format!("opening checkpoint store {}", path.display()))?,
        )
    };

    let context = StepContext {
        reasoner: Arc::from(reasoner),
        queries: Arc::new(queries),
        prompts: PromptEngine::new().context("compiling prompt templates")?,
        columns: LookupColumns::from(&config.database),
        replies: config.replies.clone(),
        temperatures: config.reasoner.temperature.clone(),
    };

    let graph = vote_inquiry_graph().context("building the step graph")?;
    let executor = WorkflowExecutor::new(graph, context, store, config.checkpoints.durability);

    Ok(ChatService::new(executor))
}
