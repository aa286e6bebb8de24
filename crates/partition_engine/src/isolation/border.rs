//! World-border isolation.
//!
//! Border geometry belongs to the world manager; this enforcer only hands it
//! each enabled partition's world list when the toggle is on.

use crate::host::WorldManager;
use crate::layout::PartitionLayout;
use tracing::{debug, warn};

pub struct WorldBorderEnforcer;

impl WorldBorderEnforcer {
    /// Applies borders for every enabled partition with at least one world.
    ///
    /// Returns how many partitions were applied successfully. Failures are
    /// logged and skipped.
    pub fn apply(layout: &PartitionLayout, worlds: Option<&dyn WorldManager>) -> usize {
        if !layout.isolation.world_border {
            return 0;
        }
        let Some(worlds) = worlds else {
            debug!("No world manager bound, skipping world borders");
            return 0;
        };

        let mut applied = 0;
        for partition in layout.catalog.enabled() {
            let members = layout.index.worlds_of(&partition.id);
            if members.is_empty() {
                continue;
            }
            match worlds.apply_border(&partition.id, members) {
                Ok(()) => applied += 1,
                Err(e) => warn!(partition = %partition.id, "Failed to apply world border: {}", e),
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PartitionConfig, PartitionDefinition};
    use crate::host::memory::{InMemoryHost, PrimitiveCall};
    use crate::isolation::IsolationSettings;

    fn layout(world_border: bool) -> PartitionLayout {
        PartitionLayout::from_config(&PartitionConfig {
            isolation: IsolationSettings {
                world_border,
                ..IsolationSettings::default()
            },
            partitions: vec![
                PartitionDefinition::new("alpha").with_worlds(["alpha_1"]),
                PartitionDefinition::new("beta").with_worlds(["beta_1"]).disabled(),
                PartitionDefinition::new("empty"),
            ],
        })
        .unwrap()
    }

    #[test]
    fn test_applies_enabled_partitions_only() {
        let host = InMemoryHost::new();
        assert_eq!(WorldBorderEnforcer::apply(&layout(true), Some(&host)), 1);

        let calls = host.calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(&calls[0], PrimitiveCall::Border { partition, .. } if partition.as_str() == "alpha"));
    }

    #[test]
    fn test_toggle_off_or_no_manager() {
        let host = InMemoryHost::new();
        assert_eq!(WorldBorderEnforcer::apply(&layout(false), Some(&host)), 0);
        assert_eq!(WorldBorderEnforcer::apply(&layout(true), None), 0);
        assert!(host.calls().is_empty());
    }
}
