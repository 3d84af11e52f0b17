//! Configuration loading with multi-layer merge

use super::{CheckpointConfig, DatabaseConfig, ReasonerConfig, RepliesConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use toml::{Table, Value};

/// Top-level vote-inquiry configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub reasoner: ReasonerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub checkpoints: CheckpointConfig,

    #[serde(default)]
    pub replies: RepliesConfig,
}

impl AppConfig {
    /// Load configuration from the standard hierarchy
    ///
    /// Load order (later overrides earlier):
    /// 1. Built-in defaults
    /// 2. ~/.config/vote-inquiry/config.toml
    /// 3. .vote-inquiry/config.toml (working directory)
    /// 4. An explicit file passed with `--config`
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut layers = Vec::new();

        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                layers.push(user_config_path);
            }
        }

        let project_config_path = PathBuf::from(".vote-inquiry/config.toml");
        if project_config_path.exists() {
            layers.push(project_config_path);
        }

        if let Some(path) = explicit {
            layers.push(path.to_path_buf());
        }

        Self::load_layers(&layers)
    }

    /// Merge the files key by key, later files winning, then decode
    pub fn load_layers(paths: &[PathBuf]) -> Result<Self> {
        let mut merged = Table::new();
        for path in paths {
            merge_tables(&mut merged, Self::load_table(path)?);
        }
        Value::Table(merged)
            .try_into::<Self>()
            .context("decoding merged configuration")
    }

    /// Load configuration from a specific file
    pub fn load_file(path: &Path) -> Result<Self> {
        Value::Table(Self::load_table(path)?)
            .try_into::<Self>()
            .with_context(|| format!("decoding {}", path.display()))
    }

    /// Read one layer, checking it decodes on its own
    fn load_table(path: &Path) -> Result<Table> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let table: Table =
            toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
        Value::Table(table.clone())
            .try_into::<Self>()
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(table)
    }

    /// Get the user config path (~/.config/vote-inquiry/config.toml)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("vote-inquiry/config.toml"))
    }
}

/// Merge `layer` into `base`: nested tables merge, any other value replaces
fn merge_tables(base: &mut Table, layer: Table) {
    for (key, value) in layer {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Durability;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_load_empty_config() {
        let config = AppConfig::default();
        assert_eq!(config.reasoner, ReasonerConfig::default());
        assert_eq!(config.checkpoints.durability, Durability::EndOfTurn);
    }

    #[test]
    fn test_load_config_file() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
            [reasoner]
            model = "gpt-4o-mini"
            max_retries = 1

            [database]
            path = "/data/votes.db"

            [checkpoints]
            durability = "every_step"
        "#
        )
        .unwrap();

        let config = AppConfig::load_file(&config_path).unwrap();
        assert_eq!(config.reasoner.model, "gpt-4o-mini");
        assert_eq!(config.reasoner.max_retries, 1);
        assert_eq!(config.database.path, "/data/votes.db");
        assert_eq!(config.checkpoints.durability, Durability::EveryStep);
    }

    #[test]
    fn test_layers_merge_per_key() {
        let dir = TempDir::new().unwrap();
        let user = dir.path().join("user.toml");
        let project = dir.path().join("project.toml");
        std::fs::write(
            &user,
            "[reasoner]\napi_key = \"sk-user\"\n\n[reasoner.temperature]\nconverse = 0.9\n\n[database]\npath = \"base.db\"\n",
        )
        .unwrap();
        std::fs::write(
            &project,
            "[reasoner]\nmodel = \"gpt-4o-mini\"\n\n[reasoner.temperature]\nscope_check = 0.0\n",
        )
        .unwrap();

        let config = AppConfig::load_layers(&[user, project]).unwrap();

        assert_eq!(config.reasoner.api_key.as_deref(), Some("sk-user"));
        assert_eq!(config.reasoner.model, "gpt-4o-mini");
        assert_eq!(config.reasoner.temperature.converse, 0.9);
        assert_eq!(config.reasoner.temperature.scope_check, 0.0);
        assert_eq!(config.database.path, "base.db");
        assert_eq!(config.checkpoints.durability, Durability::EndOfTurn);
    }

    #[test]
    fn test_later_layer_wins() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first.toml");
        let second = dir.path().join("second.toml");
        std::fs::write(&first, "[reasoner]\nmodel = \"a\"\nmax_retries = 5\n").unwrap();
        std::fs::write(&second, "[reasoner]\nmodel = \"b\"\n").unwrap();

        let config = AppConfig::load_layers(&[first, second]).unwrap();
        assert_eq!(config.reasoner.model, "b");
        assert_eq!(config.reasoner.max_retries, 5);
    }

    #[test]
    fn test_invalid_layer_names_its_file() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.toml");
        let bad = dir.path().join("bad.toml");
        std::fs::write(&good, "[reasoner]\nmodel = \"a\"\n").unwrap();
        std::fs::write(&bad, "[reasoner]\nmodle = \"b\"\n").unwrap();

        let err = AppConfig::load_layers(&[good, bad]).unwrap_err();
        assert!(format!("{:#}", err).contains("bad.toml"));
    }

    #[test]
    fn test_unknown_section_rejected() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(&config_path, "[ballots]\ntable = \"votos\"\n").unwrap();

        assert!(AppConfig::load_file(&config_path).is_err());
    }

    #[test]
    fn test_load_with_explicit_file() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("explicit.toml");
        std::fs::write(&config_path, "[replies]\nno_data_found = \"nada\"\n").unwrap();

        let config = AppConfig::load(Some(&config_path)).unwrap();
        assert_eq!(config.replies.no_data_found, "nada");
    }
}
