//! World-to-partition index.
//!
//! A pure lookup built by inverting each enabled partition's member list.
//! Rebuilding costs O(total worlds) and only happens on (re)load.

use crate::catalog::PartitionCatalog;
use crate::error::{ConfigError, ConfigResult};
use crate::types::{PartitionId, WorldId};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldIndex {
    world_to_partition: HashMap<WorldId, PartitionId>,
    partition_worlds: HashMap<PartitionId, Vec<WorldId>>,
}

impl WorldIndex {
    /// Builds the index from a catalog.
    ///
    /// Disabled partitions do not claim their worlds, so those worlds resolve
    /// to no partition. A world claimed by two enabled partitions is rejected
    /// even though [`PartitionCatalog::from_config`] already validates it,
    /// because the index must never silently pick one owner.
    pub fn build(catalog: &PartitionCatalog) -> ConfigResult<Self> {
        let mut world_to_partition = HashMap::new();
        let mut partition_worlds = HashMap::new();

        for partition in catalog.enabled() {
            for world in &partition.worlds {
                if let Some(first) = world_to_partition.insert(world.clone(), partition.id.clone()) {
                    return Err(ConfigError::DuplicateWorld {
                        world: world.clone(),
                        first,
                        second: partition.id.clone(),
                    });
                }
            }
            partition_worlds.insert(partition.id.clone(), partition.worlds.clone());
        }

        Ok(Self {
            world_to_partition,
            partition_worlds,
        })
    }

    /// Resolves the partition owning a world. `None` means the world is
    /// global/unpartitioned.
    pub fn partition_for_world(&self, world: &WorldId) -> Option<&PartitionId> {
        self.world_to_partition.get(world)
    }

    /// Member worlds of an enabled partition.
    pub fn worlds_of(&self, partition: &PartitionId) -> &[WorldId] {
        self.partition_worlds
            .get(partition)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn world_count(&self) -> usize {
        self.world_to_partition.len()
    }
}
