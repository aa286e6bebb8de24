//! Player-list isolation.
//!
//! The player list reuses the visibility engine's state: a hidden player is
//! also absent from the list. On top of the incremental per-player update,
//! membership changes trigger a sweep of the partitions they touched.

use crate::isolation::IsolationSettings;
use crate::types::PartitionId;

pub struct TabListEnforcer;

impl TabListEnforcer {
    /// Partitions to sweep after a player moved from `before` to `after`.
    ///
    /// Empty when the toggle is off, or when the player stayed where they
    /// were. Unresolved sides contribute nothing.
    pub fn partitions_to_reconcile(
        settings: &IsolationSettings,
        before: Option<&PartitionId>,
        after: Option<&PartitionId>,
    ) -> Vec<PartitionId> {
        if !settings.tablist || before == after {
            return Vec::new();
        }

        before.into_iter().chain(after).cloned().collect()
    }
}
