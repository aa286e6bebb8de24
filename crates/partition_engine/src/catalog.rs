//! Partition definition store.
//!
//! The catalog is the read-mostly, validated view of the configuration. It is
//! never mutated in place: a reload builds a fresh catalog and the whole
//! [`crate::layout::PartitionLayout`] is swapped.

use crate::config::{PartitionConfig, PartitionDefinition};
use crate::error::ConfigResult;
use crate::types::{CapabilityName, PartitionId, SpawnPoint, WorldId};
use std::collections::HashMap;

/// A partition as seen by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub id: PartitionId,
    pub name: String,
    pub description: String,
    pub worlds: Vec<WorldId>,
    pub capabilities: Vec<CapabilityName>,
    pub spawn: Option<SpawnPoint>,
    pub persistent: bool,
    pub enabled: bool,
    pub auto_load: bool,
}

impl Partition {
    fn from_definition(definition: &PartitionDefinition) -> Self {
        let name = if definition.name.is_empty() {
            definition.id.to_string()
        } else {
            definition.name.clone()
        };

        Self {
            id: definition.id.clone(),
            name,
            description: definition.description.clone(),
            worlds: definition.worlds.clone(),
            capabilities: definition.capabilities.clone(),
            spawn: definition.spawn.clone(),
            persistent: definition.persistent,
            enabled: definition.enabled,
            auto_load: definition.auto_load,
        }
    }

    fn to_definition(&self) -> PartitionDefinition {
        PartitionDefinition {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            enabled: self.enabled,
            auto_load: self.auto_load,
            persistent: self.persistent,
            worlds: self.worlds.clone(),
            capabilities: self.capabilities.clone(),
            spawn: self.spawn.clone(),
        }
    }

    /// Whether the partition lists the given world as a member.
    pub fn contains_world(&self, world: &WorldId) -> bool {
        self.worlds.contains(world)
    }
}

/// Ordered catalog of every configured partition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionCatalog {
    partitions: Vec<Partition>,
    positions: HashMap<PartitionId, usize>,
}

impl PartitionCatalog {
    /// Validates the configuration and builds the catalog from it.
    pub fn from_config(config: &PartitionConfig) -> ConfigResult<Self> {
        config.validate()?;

        let partitions: Vec<Partition> = config
            .partitions
            .iter()
            .map(Partition::from_definition)
            .collect();
        let positions = partitions
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect();

        Ok(Self {
            partitions,
            positions,
        })
    }

    /// Converts the catalog back into definitions, preserving order.
    pub fn to_definitions(&self) -> Vec<PartitionDefinition> {
        self.partitions.iter().map(Partition::to_definition).collect()
    }

    pub fn get(&self, id: &PartitionId) -> Option<&Partition> {
        self.positions.get(id).map(|&i| &self.partitions[i])
    }

    pub fn contains(&self, id: &PartitionId) -> bool {
        self.positions.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Partition> {
        self.partitions.iter()
    }

    /// Enabled partitions, in declaration order.
    pub fn enabled(&self) -> impl Iterator<Item = &Partition> {
        self.partitions.iter().filter(|p| p.enabled)
    }

    pub fn ids(&self) -> Vec<PartitionId> {
        self.partitions.iter().map(|p| p.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Worlds the host should load at startup: members of enabled partitions
    /// flagged `auto_load`.
    pub fn auto_load_worlds(&self) -> Vec<WorldId> {
        self.enabled()
            .filter(|p| p.auto_load)
            .flat_map(|p| p.worlds.iter().cloned())
            .collect()
    }

    pub fn spawn_for(&self, id: &PartitionId) -> Option<&SpawnPoint> {
        self.get(id).and_then(|p| p.spawn.as_ref())
    }
}
