//! Capability scoping table.
//!
//! Tracks which named capabilities (plugins) are active in which partition.
//! Collaborators query it instead of reaching into partition internals.

use crate::catalog::PartitionCatalog;
use crate::types::{CapabilityName, PartitionId};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilityTable {
    by_capability: HashMap<CapabilityName, BTreeSet<PartitionId>>,
    by_partition: HashMap<PartitionId, Vec<CapabilityName>>,
}

impl CapabilityTable {
    /// Builds the table from the enabled partitions of a catalog.
    pub fn build(catalog: &PartitionCatalog) -> Self {
        let mut by_capability: HashMap<CapabilityName, BTreeSet<PartitionId>> = HashMap::new();
        let mut by_partition = HashMap::new();

        for partition in catalog.enabled() {
            for capability in &partition.capabilities {
                by_capability
                    .entry(capability.clone())
                    .or_default()
                    .insert(partition.id.clone());
            }
            by_partition.insert(partition.id.clone(), partition.capabilities.clone());
        }

        Self {
            by_capability,
            by_partition,
        }
    }

    pub fn is_capability_active_in_partition(&self, name: &str, partition: &PartitionId) -> bool {
        self.by_capability
            .get(name)
            .is_some_and(|partitions| partitions.contains(partition))
    }

    /// Partitions a capability is active in, sorted by id.
    pub fn partitions_for_capability(&self, name: &str) -> Vec<PartitionId> {
        self.by_capability
            .get(name)
            .map(|partitions| partitions.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn capabilities_for_partition(&self, partition: &PartitionId) -> &[CapabilityName] {
        self.by_partition
            .get(partition)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
