//! Partition configuration document.
//!
//! This module handles loading, validation and serialization of the partition
//! definitions and the global isolation toggles from TOML.

use crate::error::{ConfigError, ConfigResult};
use crate::isolation::IsolationSettings;
use crate::types::{CapabilityName, PartitionId, SpawnPoint, WorldId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::info;

fn default_true() -> bool {
    true
}

/// The structured document describing every partition of the process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Global isolation toggles
    #[serde(default)]
    pub isolation: IsolationSettings,
    /// Partition definitions, in declaration order
    #[serde(default)]
    pub partitions: Vec<PartitionDefinition>,
}

/// One partition as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionDefinition {
    /// Stable identifier
    pub id: PartitionId,
    /// Display name (defaults to the id when empty)
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Disabled partitions stay in the catalog but do not claim their worlds
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Whether the host should load the member worlds at startup
    #[serde(default = "default_true")]
    pub auto_load: bool,
    /// Whether per-player state is kept across partition restarts
    #[serde(default)]
    pub persistent: bool,
    /// Member worlds, in order
    #[serde(default)]
    pub worlds: Vec<WorldId>,
    /// Capabilities (plugins) active in this partition
    #[serde(default)]
    pub capabilities: Vec<CapabilityName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawn: Option<SpawnPoint>,
}

impl PartitionDefinition {
    /// Creates an enabled definition with no worlds or capabilities.
    pub fn new(id: impl Into<PartitionId>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            description: String::new(),
            enabled: true,
            auto_load: true,
            persistent: false,
            worlds: Vec::new(),
            capabilities: Vec::new(),
            spawn: None,
        }
    }

    pub fn with_worlds<I, W>(mut self, worlds: I) -> Self
    where
        I: IntoIterator<Item = W>,
        W: Into<WorldId>,
    {
        self.worlds = worlds.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_capabilities<I, C>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<CapabilityName>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_spawn(mut self, spawn: SpawnPoint) -> Self {
        self.spawn = Some(spawn);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl PartitionConfig {
    /// Parses a configuration document from TOML text.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Serializes the configuration back to TOML.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Loads and validates a configuration file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the TOML document
    ///
    /// # Returns
    ///
    /// The parsed configuration, or a [`ConfigError`] naming the file or the
    /// offending partition/world identifiers.
    pub async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
        let config = Self::from_toml_str(&content)?;
        config.validate()?;
        info!(
            "📋 Loaded {} partition definitions from {}",
            config.partitions.len(),
            path.display()
        );
        Ok(config)
    }

    /// Writes the configuration to disk as TOML.
    pub async fn save_to_file(&self, path: &Path) -> ConfigResult<()> {
        let content = self.to_toml_string()?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| ConfigError::FileWrite(path.to_path_buf(), e))
    }

    /// Validates the definitions for consistency.
    ///
    /// Every world is checked across all partitions, disabled ones included,
    /// so that enabling a partition later can never create an ambiguity.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut seen_ids = HashSet::new();
        let mut world_owner: HashMap<&WorldId, &PartitionId> = HashMap::new();

        for partition in &self.partitions {
            if partition.id.as_str().trim().is_empty() {
                return Err(ConfigError::EmptyPartitionId);
            }
            if !seen_ids.insert(&partition.id) {
                return Err(ConfigError::DuplicatePartition(partition.id.clone()));
            }

            for world in &partition.worlds {
                if world.as_str().trim().is_empty() {
                    return Err(ConfigError::EmptyWorldId(partition.id.clone()));
                }
                if let Some(first) = world_owner.insert(world, &partition.id) {
                    return Err(ConfigError::DuplicateWorld {
                        world: world.clone(),
                        first: first.clone(),
                        second: partition.id.clone(),
                    });
                }
            }

            if let Some(spawn) = &partition.spawn {
                if !partition.worlds.contains(&spawn.world) {
                    return Err(ConfigError::SpawnOutsidePartition {
                        partition: partition.id.clone(),
                        world: spawn.world.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Position;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
[isolation]
chat = true
tablist = true
commands = false

[[partitions]]
id = "alpha"
name = "Alpha Arena"
persistent = true
worlds = ["alpha_1", "alpha_nether"]
capabilities = ["battle_royale"]

[partitions.spawn]
world = "alpha_1"
x = 0.5
y = 64.0
z = 0.5
yaw = 180.0

[[partitions]]
id = "beta"
enabled = false
worlds = ["beta_1"]
"#;

    #[test]
    fn test_parse_with_defaults() {
        let config = PartitionConfig::from_toml_str(SAMPLE).unwrap();

        assert!(config.isolation.chat);
        assert!(!config.isolation.commands);
        // Missing toggles fall back to enabled
        assert!(config.isolation.world_border);

        let alpha = &config.partitions[0];
        assert_eq!(alpha.name, "Alpha Arena");
        assert!(alpha.enabled);
        assert!(alpha.auto_load);
        assert!(alpha.persistent);
        assert_eq!(alpha.worlds.len(), 2);
        let spawn = alpha.spawn.as_ref().unwrap();
        assert_eq!(spawn.position, Position::new(0.5, 64.0, 0.5));
        assert_eq!(spawn.yaw, 180.0);
        assert_eq!(spawn.pitch, 0.0);

        let beta = &config.partitions[1];
        assert!(!beta.enabled);
        assert!(!beta.persistent);
        assert!(beta.capabilities.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_roundtrip_is_identical() {
        let config = PartitionConfig::from_toml_str(SAMPLE).unwrap();
        let text = config.to_toml_string().unwrap();
        let reparsed = PartitionConfig::from_toml_str(&text).unwrap();
        assert_eq!(config, reparsed);
    }

    #[test]
    fn test_world_claimed_twice_is_rejected() {
        let config = PartitionConfig {
            isolation: IsolationSettings::default(),
            partitions: vec![
                PartitionDefinition::new("alpha").with_worlds(["shared"]),
                PartitionDefinition::new("beta").with_worlds(["beta_1", "shared"]),
            ],
        };

        match config.validate() {
            Err(ConfigError::DuplicateWorld { world, first, second }) => {
                assert_eq!(world.as_str(), "shared");
                assert_eq!(first.as_str(), "alpha");
                assert_eq!(second.as_str(), "beta");
            }
            other => panic!("expected DuplicateWorld, got {:?}", other),
        }
    }

    #[test]
    fn test_disabled_partitions_still_count_for_duplicates() {
        let config = PartitionConfig {
            isolation: IsolationSettings::default(),
            partitions: vec![
                PartitionDefinition::new("alpha").with_worlds(["shared"]),
                PartitionDefinition::new("beta").with_worlds(["shared"]).disabled(),
            ],
        };
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateWorld { .. })));
    }

    #[test]
    fn test_other_validation_errors() {
        let empty_id = PartitionConfig {
            partitions: vec![PartitionDefinition::new("  ")],
            ..Default::default()
        };
        assert!(matches!(empty_id.validate(), Err(ConfigError::EmptyPartitionId)));

        let duplicate_id = PartitionConfig {
            partitions: vec![PartitionDefinition::new("a"), PartitionDefinition::new("a")],
            ..Default::default()
        };
        assert!(matches!(duplicate_id.validate(), Err(ConfigError::DuplicatePartition(_))));

        let empty_world = PartitionConfig {
            partitions: vec![PartitionDefinition::new("a").with_worlds([""])],
            ..Default::default()
        };
        assert!(matches!(empty_world.validate(), Err(ConfigError::EmptyWorldId(_))));

        let bad_spawn = PartitionConfig {
            partitions: vec![PartitionDefinition::new("a")
                .with_worlds(["a_1"])
                .with_spawn(SpawnPoint::new("lobby", Position::default()))],
            ..Default::default()
        };
        assert!(matches!(
            bad_spawn.validate(),
            Err(ConfigError::SpawnOutsidePartition { .. })
        ));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let result = PartitionConfig::from_toml_str("[[partitions]]\nid = 5");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[tokio::test]
    async fn test_save_and_load_file() {
        let config = PartitionConfig::from_toml_str(SAMPLE).unwrap();
        let temp_file = NamedTempFile::new().unwrap();

        config.save_to_file(temp_file.path()).await.unwrap();
        let loaded = PartitionConfig::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config, loaded);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let result = PartitionConfig::load_from_file(Path::new("does/not/exist.toml")).await;
        assert!(matches!(result, Err(ConfigError::FileRead(_, _))));
    }
}
