//! Restart coordinator.
//!
//! A partition "restart" recycles its worlds without disconnecting anyone.
//! [`RestartCoordinator::prepare_restart`] finalizes the sessions of every
//! member and remembers who they were; [`RestartCoordinator::restore_after_restart`]
//! reopens sessions for those still connected. Per-player state is never
//! discarded in between.

use crate::error::{EngineError, EngineResult};
use crate::membership::MembershipTracker;
use crate::state::PlayerStateStore;
use crate::types::{PartitionId, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Members of a partition captured when a restart was prepared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestartSnapshot {
    pub partition: PartitionId,
    /// Sorted member ids
    pub players: Vec<PlayerId>,
    /// When the snapshot was taken, ms since the epoch
    pub taken_at: u64,
}

/// Outcome of restoring a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestoreReport {
    /// Players whose sessions were reopened
    pub restored: Vec<PlayerId>,
    /// Players no longer connected, or now in another partition
    pub dropped: Vec<PlayerId>,
}

#[derive(Debug, Default)]
pub struct RestartCoordinator {
    snapshots: HashMap<PartitionId, RestartSnapshot>,
}

impl RestartCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finalizes the session of every current member and stores the member
    /// set. Preparing twice replaces the earlier snapshot.
    pub fn prepare_restart(
        &mut self,
        tracker: &MembershipTracker<'_>,
        store: &PlayerStateStore,
        partition: &PartitionId,
    ) -> RestartSnapshot {
        let mut players: Vec<PlayerId> = tracker.players_in_partition(partition).into_iter().collect();
        players.sort();

        for &player in &players {
            if store.end_session(partition, player).is_none() {
                // No state yet; create it so restore has something to reopen
                store.begin_session(partition, player);
                store.end_session(partition, player);
            }
        }

        let snapshot = RestartSnapshot {
            partition: partition.clone(),
            players,
            taken_at: store.now_millis(),
        };
        info!(
            "♻️ Prepared restart of partition '{}' ({} players)",
            partition,
            snapshot.players.len()
        );
        self.snapshots.insert(partition.clone(), snapshot.clone());
        snapshot
    }

    /// Reopens sessions for snapshotted players that are still connected.
    ///
    /// A player is dropped from the restore set when they disconnected or
    /// moved into a different partition in the meantime. Players waiting in
    /// an unmapped world are restored without a session; it opens when they
    /// enter one of the partition's worlds.
    pub fn restore_after_restart(
        &mut self,
        tracker: &MembershipTracker<'_>,
        store: &PlayerStateStore,
        partition: &PartitionId,
    ) -> EngineResult<RestoreReport> {
        let snapshot = self
            .snapshots
            .remove(partition)
            .ok_or_else(|| EngineError::NoRestartSnapshot(partition.clone()))?;

        let mut report = RestoreReport::default();
        for player in snapshot.players {
            if !tracker.directory().is_online(player) {
                debug!(%player, "Dropping disconnected player from restore set");
                report.dropped.push(player);
                continue;
            }
            match tracker.partition_for_player(player) {
                Some(current) if &current != partition => {
                    debug!(%player, %current, "Player moved to another partition during restart");
                    report.dropped.push(player);
                }
                Some(_) => {
                    store.begin_session(partition, player);
                    report.restored.push(player);
                }
                None => {
                    debug!(%player, "Restoring player waiting outside the partition");
                    report.restored.push(player);
                }
            }
        }

        info!(
            "✅ Restored partition '{}' ({} restored, {} dropped)",
            partition,
            report.restored.len(),
            report.dropped.len()
        );
        Ok(report)
    }

    pub fn snapshot(&self, partition: &PartitionId) -> Option<&RestartSnapshot> {
        self.snapshots.get(partition)
    }

    /// Partitions with a prepared but not yet restored restart.
    pub fn pending(&self) -> Vec<PartitionId> {
        let mut pending: Vec<PartitionId> = self.snapshots.keys().cloned().collect();
        pending.sort();
        pending
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}
