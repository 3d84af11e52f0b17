//! Votes database and checkpoint storage configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The relational database queried for votes
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Path to the SQLite votes database (`~` is expanded)
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Column holding the name a candidate is voted under
    #[serde(default = "default_alias_column")]
    pub alias_column: String,

    /// Column holding the candidate's registered name
    #[serde(default = "default_formal_name_column")]
    pub formal_name_column: String,

    /// Column of the lookup result carrying the candidate id
    #[serde(default = "default_entity_id_column")]
    pub entity_id_column: String,

    /// How long to wait on a locked database, in milliseconds
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_database_path() -> String {
    "votes.db".into()
}

fn default_alias_column() -> String {
    "nm_votavel".into()
}

fn default_formal_name_column() -> String {
    "nm_candidato".into()
}

fn default_entity_id_column() -> String {
    "sq_candidato".into()
}

fn default_busy_timeout() -> u64 {
    5000
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            alias_column: default_alias_column(),
            formal_name_column: default_formal_name_column(),
            entity_id_column: default_entity_id_column(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

impl DatabaseConfig {
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).into_owned())
    }
}

/// When the executor persists checkpoints
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    /// Save once, after the last step of a turn
    #[default]
    EndOfTurn,
    /// Save after every step, plus the end-of-turn save
    EveryStep,
}

/// Checkpoint storage settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CheckpointConfig {
    /// Path to the checkpoint database; defaults to the user data directory
    pub path: Option<String>,

    #[serde(default)]
    pub durability: Durability,
}

impl CheckpointConfig {
    /// Resolve the checkpoint database path, creating its directory if needed
    pub fn resolved_path(&self) -> Result<PathBuf> {
        let path = match self.path {
            Some(ref path) => PathBuf::from(shellexpand::tilde(path).into_owned()),
            None => dirs::data_dir()
                .context("Could not determine data directory")?
                .join("vote-inquiry")
                .join("checkpoints.db"),
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create checkpoint directory at {}", parent.display())
                })?;
            }
        }

        Ok(path)
    }
}
