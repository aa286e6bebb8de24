//! Configuration management for the partition server.
//!
//! One TOML file carries both the server settings and the partition layout
//! handed to the engine.

use anyhow::{Context, Result};
use partition_engine::{IsolationSettings, PartitionConfig, PartitionDefinition};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

fn default_reconcile_interval() -> u64 {
    300
}

fn default_monitor_interval() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub isolation: IsolationSettings,
    #[serde(default)]
    pub partitions: Vec<PartitionDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Seconds between full visibility sweeps (0 disables)
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,
    /// Seconds between status lines (0 disables)
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: default_reconcile_interval(),
            monitor_interval_secs: default_monitor_interval(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            logging: LoggingSettings::default(),
            isolation: IsolationSettings::default(),
            partitions: vec![
                PartitionDefinition::new("lobby").with_worlds(["lobby"]),
            ],
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, writes a default configuration to the path
    /// and returns it.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let config: AppConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// The part of the file the engine consumes.
    pub fn to_partition_config(&self) -> PartitionConfig {
        PartitionConfig {
            isolation: self.isolation.clone(),
            partitions: self.partitions.clone(),
        }
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing the issue.
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        self.to_partition_config()
            .validate()
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partition_engine::{PartitionId, WorldId};
    use tempfile::{tempdir, NamedTempFile};

    const SAMPLE: &str = r#"
[server]
reconcile_interval_secs = 30

[logging]
level = "debug"
json_format = true

[isolation]
chat = true
tablist = true
commands = false

[[partitions]]
id = "alpha"
name = "Alpha"
persistent = true
worlds = ["alpha_1", "alpha_nether"]
capabilities = ["battle_royale"]

[partitions.spawn]
world = "alpha_1"
x = 0.5
y = 64.0
z = 0.5

[[partitions]]
id = "beta"
worlds = ["beta_1"]
"#;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.reconcile_interval_secs, 300);
        assert_eq!(config.server.monitor_interval_secs, 60);
        assert_eq!(config.logging.level, "info");
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let temp_file = NamedTempFile::new().unwrap();
        tokio::fs::write(temp_file.path(), SAMPLE).await.unwrap();

        let config = AppConfig::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.server.reconcile_interval_secs, 30);
        assert_eq!(config.server.monitor_interval_secs, 60);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
        assert!(!config.isolation.commands);
        assert!(config.isolation.world_border);

        let partitions = config.to_partition_config();
        assert_eq!(partitions.partitions.len(), 2);
        assert_eq!(partitions.partitions[0].id, PartitionId::from("alpha"));
        assert_eq!(
            partitions.partitions[0].spawn.as_ref().map(|s| s.world.clone()),
            Some(WorldId::from("alpha_1"))
        );
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_creates_default_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partitions.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());

        // The written file loads back to the same thing
        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded, config);
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let temp_file = NamedTempFile::new().unwrap();
        tokio::fs::write(temp_file.path(), "[[partitions]]\nworlds = 3\n")
            .await
            .unwrap();

        assert!(AppConfig::load_from_file(temp_file.path()).await.is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().unwrap_err().contains("Invalid log level"));

        let mut config = AppConfig::default();
        config
            .partitions
            .push(PartitionDefinition::new("other").with_worlds(["lobby"]));
        let error = config.validate().unwrap_err();
        assert!(error.contains("lobby"), "{}", error);
    }
}
