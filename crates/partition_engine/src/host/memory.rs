//! Headless in-memory host.
//!
//! Keeps players, worlds and the hidden-pair ground truth in memory and
//! records every primitive call unless the call log is switched off. Used by
//! the test suites and by the server binary when no game runtime is attached.

use super::{PlayerDirectory, VisibilityPrimitive, WorldManager};
use crate::error::{HostError, HostResult};
use crate::types::{PartitionId, PlayerId, SpawnPoint, WorldId};
use dashmap::{DashMap, DashSet};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
struct OnlinePlayer {
    name: String,
    world: WorldId,
}

/// One recorded host primitive invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveCall {
    Show { viewer: PlayerId, target: PlayerId },
    Hide { viewer: PlayerId, target: PlayerId },
    LoadWorld(WorldId),
    Teleport { player: PlayerId, spawn: SpawnPoint },
    Border { partition: PartitionId, worlds: Vec<WorldId> },
}

#[derive(Debug, Default)]
pub struct InMemoryHost {
    players: DashMap<PlayerId, OnlinePlayer>,
    /// (viewer, target) pairs currently hidden
    hidden: DashSet<(PlayerId, PlayerId)>,
    /// Players whose primitives fail, simulating stale references
    broken: DashSet<PlayerId>,
    /// Worlds that fail to load
    unavailable: DashSet<WorldId>,
    calls: Mutex<Vec<PrimitiveCall>>,
    /// Long-lived hosts skip the call log so it cannot grow unbounded
    call_log_disabled: bool,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops recording primitive calls. [`InMemoryHost::calls`] stays empty.
    pub fn without_call_log(mut self) -> Self {
        self.call_log_disabled = true;
        self
    }

    /// Connects a new player in the given world.
    pub fn connect(&self, name: &str, world: impl Into<WorldId>) -> PlayerId {
        let id = PlayerId::new();
        self.connect_with_id(id, name, world);
        id
    }

    pub fn connect_with_id(&self, id: PlayerId, name: &str, world: impl Into<WorldId>) {
        self.players.insert(
            id,
            OnlinePlayer {
                name: name.to_string(),
                world: world.into(),
            },
        );
    }

    /// Removes a player. Hidden pairs involving them are forgotten, the way
    /// a real client forgets entity state on logout.
    pub fn disconnect(&self, id: PlayerId) {
        self.players.remove(&id);
        self.hidden.retain(|(viewer, target)| *viewer != id && *target != id);
    }

    /// Moves a player and returns the world they left.
    pub fn move_to(&self, id: PlayerId, world: impl Into<WorldId>) -> Option<WorldId> {
        self.players
            .get_mut(&id)
            .map(|mut player| std::mem::replace(&mut player.world, world.into()))
    }

    /// Ground truth: whether the viewer's client currently renders the target.
    pub fn can_see(&self, viewer: PlayerId, target: PlayerId) -> bool {
        !self.hidden.contains(&(viewer, target))
    }

    pub fn hidden_pair_count(&self) -> usize {
        self.hidden.len()
    }

    /// Makes every primitive involving this player fail until healed.
    pub fn break_player(&self, id: PlayerId) {
        self.broken.insert(id);
    }

    pub fn heal_player(&self, id: PlayerId) {
        self.broken.remove(&id);
    }

    pub fn mark_world_unavailable(&self, world: impl Into<WorldId>) {
        self.unavailable.insert(world.into());
    }

    pub fn calls(&self) -> Vec<PrimitiveCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    /// Number of recorded show/hide calls.
    pub fn visibility_call_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, PrimitiveCall::Show { .. } | PrimitiveCall::Hide { .. }))
            .count()
    }

    fn record(&self, call: PrimitiveCall) {
        if self.call_log_disabled {
            return;
        }
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn check_pair(&self, viewer: PlayerId, target: PlayerId) -> HostResult<()> {
        for id in [viewer, target] {
            if !self.players.contains_key(&id) {
                return Err(HostError::PlayerOffline(id));
            }
            if self.broken.contains(&id) {
                return Err(HostError::Primitive(format!("stale entity reference for {}", id)));
            }
        }
        Ok(())
    }
}

impl PlayerDirectory for InMemoryHost {
    fn online_players(&self) -> Vec<PlayerId> {
        let mut players: Vec<PlayerId> = self.players.iter().map(|entry| *entry.key()).collect();
        players.sort();
        players
    }

    fn current_world(&self, player: PlayerId) -> Option<WorldId> {
        self.players.get(&player).map(|p| p.world.clone())
    }

    fn player_by_name(&self, name: &str) -> Option<PlayerId> {
        self.players
            .iter()
            .find(|entry| entry.value().name.eq_ignore_ascii_case(name))
            .map(|entry| *entry.key())
    }
}

impl VisibilityPrimitive for InMemoryHost {
    fn show_player(&self, viewer: PlayerId, target: PlayerId) -> HostResult<()> {
        self.check_pair(viewer, target)?;
        self.hidden.remove(&(viewer, target));
        self.record(PrimitiveCall::Show { viewer, target });
        Ok(())
    }

    fn hide_player(&self, viewer: PlayerId, target: PlayerId) -> HostResult<()> {
        self.check_pair(viewer, target)?;
        self.hidden.insert((viewer, target));
        self.record(PrimitiveCall::Hide { viewer, target });
        Ok(())
    }
}

impl WorldManager for InMemoryHost {
    fn load_world(&self, world: &WorldId) -> HostResult<()> {
        if self.unavailable.contains(world) {
            return Err(HostError::WorldUnavailable(world.clone()));
        }
        self.record(PrimitiveCall::LoadWorld(world.clone()));
        Ok(())
    }

    fn teleport(&self, player: PlayerId, spawn: &SpawnPoint) -> HostResult<()> {
        if self.broken.contains(&player) {
            return Err(HostError::Primitive(format!("cannot teleport {}", player)));
        }
        if self.move_to(player, spawn.world.clone()).is_none() {
            return Err(HostError::PlayerOffline(player));
        }
        self.record(PrimitiveCall::Teleport {
            player,
            spawn: spawn.clone(),
        });
        Ok(())
    }

    fn apply_border(&self, partition: &PartitionId, worlds: &[WorldId]) -> HostResult<()> {
        self.record(PrimitiveCall::Border {
            partition: partition.clone(),
            worlds: worlds.to_vec(),
        });
        Ok(())
    }
}
