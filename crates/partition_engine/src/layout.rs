//! The read-mostly bundle swapped atomically on reload.

use crate::capability::CapabilityTable;
use crate::catalog::PartitionCatalog;
use crate::config::PartitionConfig;
use crate::error::ConfigResult;
use crate::index::WorldIndex;
use crate::isolation::IsolationSettings;
use crate::types::{PartitionId, WorldId};
use std::sync::{Arc, RwLock};

/// Everything derived from one configuration load.
///
/// Built all-or-nothing: if any part fails, no layout exists and the caller
/// keeps using the previous one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionLayout {
    pub catalog: PartitionCatalog,
    pub index: WorldIndex,
    pub capabilities: CapabilityTable,
    pub isolation: IsolationSettings,
}

impl PartitionLayout {
    pub fn from_config(config: &PartitionConfig) -> ConfigResult<Self> {
        let catalog = PartitionCatalog::from_config(config)?;
        let index = WorldIndex::build(&catalog)?;
        let capabilities = CapabilityTable::build(&catalog);

        Ok(Self {
            catalog,
            index,
            capabilities,
            isolation: config.isolation.clone(),
        })
    }

    /// Reconstructs the configuration document this layout was built from.
    pub fn to_config(&self) -> PartitionConfig {
        PartitionConfig {
            isolation: self.isolation.clone(),
            partitions: self.catalog.to_definitions(),
        }
    }

    pub fn partition_for_world(&self, world: &WorldId) -> Option<&PartitionId> {
        self.index.partition_for_world(world)
    }
}

/// Shared handle to the current layout.
///
/// Readers take a cheap `Arc` clone and keep a consistent view for as long
/// as they hold it; writers replace the whole structure.
#[derive(Debug, Clone, Default)]
pub struct SharedLayout {
    inner: Arc<RwLock<Arc<PartitionLayout>>>,
}

impl SharedLayout {
    pub fn new(layout: PartitionLayout) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(layout))),
        }
    }

    /// Returns the current layout.
    pub fn load(&self) -> Arc<PartitionLayout> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replaces the layout, returning the previous one.
    pub fn replace(&self, layout: PartitionLayout) -> Arc<PartitionLayout> {
        let next = Arc::new(layout);
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, next)
    }
}
