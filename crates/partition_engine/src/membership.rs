//! Player membership tracker.
//!
//! A player's partition is never stored. It is derived on every query from
//! the world the host says they are in, so membership cannot drift from
//! actual location and leaving a partition needs no bookkeeping.

use crate::host::PlayerDirectory;
use crate::layout::PartitionLayout;
use crate::types::{PartitionId, PlayerId};
use std::collections::{BTreeMap, HashSet};

/// Side-effect free projection over the host's player locations and the
/// current layout.
#[derive(Clone, Copy)]
pub struct MembershipTracker<'a> {
    layout: &'a PartitionLayout,
    directory: &'a dyn PlayerDirectory,
}

impl<'a> MembershipTracker<'a> {
    pub fn new(layout: &'a PartitionLayout, directory: &'a dyn PlayerDirectory) -> Self {
        Self { layout, directory }
    }

    pub fn layout(&self) -> &'a PartitionLayout {
        self.layout
    }

    pub fn directory(&self) -> &'a dyn PlayerDirectory {
        self.directory
    }

    /// The partition a player is in, `None` if they are offline or in an
    /// unmapped world.
    pub fn partition_for_player(&self, player: PlayerId) -> Option<PartitionId> {
        let world = self.directory.current_world(player)?;
        self.layout.partition_for_world(&world).cloned()
    }

    /// Connected players whose derived partition is `partition`.
    ///
    /// O(N) in the online population.
    pub fn players_in_partition(&self, partition: &PartitionId) -> HashSet<PlayerId> {
        self.directory
            .online_players()
            .into_iter()
            .filter(|&player| self.partition_for_player(player).as_ref() == Some(partition))
            .collect()
    }

    pub fn online_count_for_partition(&self, partition: &PartitionId) -> usize {
        self.players_in_partition(partition).len()
    }

    /// True only if both players resolve to the same partition.
    pub fn are_players_in_same_partition(&self, a: PlayerId, b: PlayerId) -> bool {
        match (self.partition_for_player(a), self.partition_for_player(b)) {
            (Some(pa), Some(pb)) => pa == pb,
            _ => false,
        }
    }

    /// Online count of every catalog partition in one pass over the
    /// population. Partitions with nobody online report zero.
    pub fn partition_counts(&self) -> BTreeMap<PartitionId, usize> {
        let mut counts: BTreeMap<PartitionId, usize> =
            self.layout.catalog.ids().into_iter().map(|id| (id, 0)).collect();

        for player in self.directory.online_players() {
            if let Some(partition) = self.partition_for_player(player) {
                *counts.entry(partition).or_default() += 1;
            }
        }

        counts
    }
}
