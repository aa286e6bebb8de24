//! # Partition Engine
//!
//! Ties the layout, membership, visibility, state and restart components
//! together behind the host-facing lifecycle:
//!
//! * [`PartitionEngine::initialize`], [`PartitionEngine::reload`],
//!   [`PartitionEngine::shutdown`]
//! * [`PartitionEngine::on_player_connect`], [`PartitionEngine::on_player_disconnect`],
//!   [`PartitionEngine::on_player_world_change`] - the only triggers into the
//!   visibility engine
//!
//! The engine is owned by a single mutation task (see [`crate::runtime`]);
//! every `&mut self` method runs there.

use crate::error::{EngineError, EngineResult};
use crate::events::{EventBus, PartitionEvent};
use crate::host::HostBindings;
use crate::isolation::{ChatEnforcer, CompletionEnforcer, Recipient, TabListEnforcer, WorldBorderEnforcer};
use crate::layout::{PartitionLayout, SharedLayout};
use crate::membership::MembershipTracker;
use crate::restart::{RestartCoordinator, RestartSnapshot, RestoreReport};
use crate::state::PlayerStateStore;
use crate::types::{current_timestamp_millis, PartitionId, PlayerId, WorldId};
use crate::visibility::{VisibilityEngine, VisibilityReport};
use crate::PartitionConfig;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

/// Outcome of a reload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReloadReport {
    /// False when the new configuration was identical to the active one
    pub changed: bool,
    /// Online players whose derived partition changed
    pub moved_players: usize,
    #[serde(skip)]
    pub visibility: VisibilityReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionStatus {
    pub id: PartitionId,
    pub name: String,
    pub enabled: bool,
    pub persistent: bool,
    pub online: usize,
    pub worlds: usize,
}

/// Point-in-time summary of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub partitions: Vec<PartitionStatus>,
    pub online_players: usize,
    /// Online players in unmapped worlds
    pub unpartitioned_players: usize,
    pub hidden_pairs: usize,
    pub open_sessions: usize,
    pub pending_restarts: Vec<PartitionId>,
}

pub struct PartitionEngine {
    host: HostBindings,
    layout: SharedLayout,
    visibility: VisibilityEngine,
    states: PlayerStateStore,
    restarts: RestartCoordinator,
    events: EventBus,
}

impl std::fmt::Debug for PartitionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionEngine")
            .field("host", &self.host)
            .field("partitions", &self.layout.load().catalog.len())
            .field("tracked_players", &self.visibility.tracked_players())
            .field("states", &self.states)
            .finish()
    }
}

impl PartitionEngine {
    /// Creates an engine from host bindings and a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the configuration is malformed or
    /// ambiguous.
    pub fn new(host: HostBindings, config: &PartitionConfig) -> EngineResult<Self> {
        let layout = PartitionLayout::from_config(config)?;
        Ok(Self {
            host,
            layout: SharedLayout::new(layout),
            visibility: VisibilityEngine::new(),
            states: PlayerStateStore::new(),
            restarts: RestartCoordinator::new(),
            events: EventBus::new(),
        })
    }

    /// Replaces the state store, e.g. to inject a clock.
    pub fn with_state_store(mut self, states: PlayerStateStore) -> Self {
        self.states = states;
        self
    }

    pub fn layout(&self) -> Arc<PartitionLayout> {
        self.layout.load()
    }

    pub fn shared_layout(&self) -> SharedLayout {
        self.layout.clone()
    }

    pub fn host(&self) -> &HostBindings {
        &self.host
    }

    pub fn state_store(&self) -> &PlayerStateStore {
        &self.states
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PartitionEvent> {
        self.events.subscribe()
    }

    pub fn visibility(&self) -> &VisibilityEngine {
        &self.visibility
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Loads auto-load worlds, applies world borders, opens sessions for
    /// players already online and runs a full visibility sweep.
    #[instrument(skip(self))]
    pub fn initialize(&mut self) -> VisibilityReport {
        let layout = self.layout.load();
        info!(
            "🚀 Initializing partition engine: {} partitions, {} mapped worlds",
            layout.catalog.len(),
            layout.index.world_count()
        );

        for partition in layout.catalog.iter() {
            info!(
                "  📦 {} ({}) - {} worlds, {} capabilities{}{}",
                partition.id,
                partition.name,
                partition.worlds.len(),
                partition.capabilities.len(),
                if partition.enabled { "" } else { ", disabled" },
                if partition.persistent { ", state kept across restarts (in memory)" } else { "" },
            );
        }

        if !layout.isolation.any_enabled() {
            warn!("⚠️ Every player-facing isolation toggle is off, partitions only scope capabilities");
        }

        self.load_worlds(&layout, &HashSet::new());
        WorldBorderEnforcer::apply(&layout, self.host.worlds.as_deref());

        let tracker = MembershipTracker::new(&layout, self.host.directory.as_ref());
        for player in self.host.directory.online_players() {
            self.visibility.track_player(player);
            if let Some(partition) = tracker.partition_for_player(player) {
                self.states.begin_session(&partition, player);
            }
        }

        let report = self
            .visibility
            .reconcile_all(&tracker, self.host.visibility.as_ref());
        info!(
            "✅ Partition engine initialized ({} hidden, {} failures)",
            report.hidden, report.failures
        );
        report
    }

    fn load_worlds(&self, layout: &PartitionLayout, already_loaded: &HashSet<WorldId>) {
        let Some(worlds) = self.host.worlds.as_deref() else {
            return;
        };
        for world in layout.catalog.auto_load_worlds() {
            if already_loaded.contains(&world) {
                continue;
            }
            match worlds.load_world(&world) {
                Ok(()) => debug!(%world, "World loaded"),
                Err(e) => warn!(%world, "Failed to load world: {}", e),
            }
        }
    }

    /// Swaps in a new configuration.
    ///
    /// The new layout is built completely before anything changes; on error
    /// the active layout stays in place. Reloading an identical configuration
    /// is a no-op.
    #[instrument(skip(self, config))]
    pub fn reload(&mut self, config: &PartitionConfig) -> EngineResult<ReloadReport> {
        let next = match PartitionLayout::from_config(config) {
            Ok(layout) => layout,
            Err(e) => {
                error!("❌ Partition reload rejected, keeping previous configuration: {}", e);
                return Err(e.into());
            }
        };

        let current = self.layout.load();
        if *current == next {
            info!("🔄 Partition configuration unchanged");
            return Ok(ReloadReport::default());
        }

        let online = self.host.directory.online_players();
        let before: HashMap<PlayerId, Option<PartitionId>> = {
            let tracker = MembershipTracker::new(&current, self.host.directory.as_ref());
            online
                .iter()
                .map(|&player| (player, tracker.partition_for_player(player)))
                .collect()
        };

        let previously_loaded: HashSet<WorldId> = current.catalog.auto_load_worlds().into_iter().collect();
        self.layout.replace(next);
        let layout = self.layout.load();
        let tracker = MembershipTracker::new(&layout, self.host.directory.as_ref());

        let mut moved_players = 0;
        for player in online {
            let old = before.get(&player).cloned().flatten();
            let new = tracker.partition_for_player(player);
            if old != new {
                moved_players += 1;
                self.move_sessions(player, old.as_ref(), new.as_ref());
            }
        }

        self.load_worlds(&layout, &previously_loaded);
        WorldBorderEnforcer::apply(&layout, self.host.worlds.as_deref());
        let visibility = self
            .visibility
            .reconcile_all(&tracker, self.host.visibility.as_ref());

        info!(
            "🔄 Partition configuration reloaded: {} partitions, {} players moved",
            layout.catalog.len(),
            moved_players
        );
        self.events.publish(PartitionEvent::LayoutReloaded {
            partitions: layout.catalog.len(),
            moved_players,
            timestamp: current_timestamp_millis(),
        });

        Ok(ReloadReport {
            changed: true,
            moved_players,
            visibility,
        })
    }

    /// Ends every session, reveals every hidden pair and discards all
    /// per-player state.
    #[instrument(skip(self))]
    pub fn shutdown(&mut self) -> VisibilityReport {
        info!("🛑 Shutting down partition engine");
        for player in self.host.directory.online_players() {
            self.states.end_all_sessions(player);
        }

        let report = self.visibility.reveal_all(self.host.visibility.as_ref());
        self.states.clear();
        self.restarts.clear();
        self.events.publish(PartitionEvent::ShutdownComplete);
        info!("✅ Partition engine shut down ({} pairs revealed)", report.shown);
        report
    }

    // ========================================================================
    // Player events
    // ========================================================================

    pub fn on_player_connect(&mut self, player: PlayerId) -> VisibilityReport {
        let layout = self.layout.load();
        let directory = Arc::clone(&self.host.directory);
        let tracker = MembershipTracker::new(&layout, directory.as_ref());
        let partition = tracker.partition_for_player(player);
        debug!(%player, partition = ?partition, "Player connected");

        self.visibility.track_player(player);
        self.move_sessions(player, None, partition.as_ref());

        let mut report = self
            .visibility
            .update_player(&tracker, self.host.visibility.as_ref(), player);
        report.merge(self.sweep(&tracker, None, partition.as_ref()));
        report
    }

    /// Handles a disconnect. Works whether or not the host still lists the
    /// player as online.
    pub fn on_player_disconnect(&mut self, player: PlayerId) -> VisibilityReport {
        let layout = self.layout.load();
        let directory = Arc::clone(&self.host.directory);
        let tracker = MembershipTracker::new(&layout, directory.as_ref());

        let closed = self.states.end_all_sessions(player);
        let timestamp = current_timestamp_millis();
        for partition in &closed {
            self.events.publish(PartitionEvent::PlayerLeftPartition {
                player,
                partition: partition.clone(),
                timestamp,
            });
        }
        self.visibility.remove_player(player);
        debug!(%player, partitions = closed.len(), "Player disconnected");

        // A player the host still lists would be picked up again by the sweep
        let mut report = VisibilityReport::default();
        if !directory.is_online(player) {
            for partition in &closed {
                report.merge(self.sweep(&tracker, Some(partition), None));
            }
        }
        report
    }

    /// Handles a world change from `from` to `to`. Visibility is computed
    /// against the worlds the host reports at the time of the call.
    pub fn on_player_world_change(&mut self, player: PlayerId, from: &WorldId, to: &WorldId) -> VisibilityReport {
        let layout = self.layout.load();
        let directory = Arc::clone(&self.host.directory);
        let tracker = MembershipTracker::new(&layout, directory.as_ref());
        let old = layout.partition_for_world(from).cloned();
        let new = layout.partition_for_world(to).cloned();
        debug!(%player, %from, %to, old = ?old, new = ?new, "Player changed world");

        if old != new {
            self.move_sessions(player, old.as_ref(), new.as_ref());
        }

        let mut report = self
            .visibility
            .update_player(&tracker, self.host.visibility.as_ref(), player);
        report.merge(self.sweep(&tracker, old.as_ref(), new.as_ref()));
        report
    }

    fn move_sessions(&self, player: PlayerId, old: Option<&PartitionId>, new: Option<&PartitionId>) {
        let timestamp = current_timestamp_millis();
        if let Some(old) = old {
            self.states.end_session(old, player);
            self.events.publish(PartitionEvent::PlayerLeftPartition {
                player,
                partition: old.clone(),
                timestamp,
            });
        }
        if let Some(new) = new {
            self.states.begin_session(new, player);
            self.events.publish(PartitionEvent::PlayerEnteredPartition {
                player,
                partition: new.clone(),
                timestamp,
            });
        }
    }

    /// Player-list sweep of the partitions a membership change touched.
    fn sweep(
        &mut self,
        tracker: &MembershipTracker<'_>,
        before: Option<&PartitionId>,
        after: Option<&PartitionId>,
    ) -> VisibilityReport {
        let mut report = VisibilityReport::default();
        for partition in TabListEnforcer::partitions_to_reconcile(&tracker.layout().isolation, before, after) {
            report.merge(
                self.visibility
                    .reconcile_partition(tracker, self.host.visibility.as_ref(), &partition),
            );
        }
        report
    }

    // ========================================================================
    // Restarts and reconciliation
    // ========================================================================

    fn require_partition(&self, layout: &PartitionLayout, partition: &PartitionId) -> EngineResult<()> {
        if layout.catalog.contains(partition) {
            Ok(())
        } else {
            Err(EngineError::UnknownPartition(partition.clone()))
        }
    }

    #[instrument(skip(self))]
    pub fn prepare_restart(&mut self, partition: &PartitionId) -> EngineResult<RestartSnapshot> {
        let layout = self.layout.load();
        self.require_partition(&layout, partition)?;
        let tracker = MembershipTracker::new(&layout, self.host.directory.as_ref());

        let snapshot = self.restarts.prepare_restart(&tracker, &self.states, partition);
        self.events.publish(PartitionEvent::RestartPrepared {
            partition: partition.clone(),
            players: snapshot.players.len(),
        });
        Ok(snapshot)
    }

    /// Reopens sessions for snapshotted players and reconciles the
    /// partition. With `teleport_to_spawn`, restored players are sent to the
    /// partition spawn if one is configured and a world manager is bound.
    #[instrument(skip(self))]
    pub fn restore_after_restart(
        &mut self,
        partition: &PartitionId,
        teleport_to_spawn: bool,
    ) -> EngineResult<RestoreReport> {
        let layout = self.layout.load();
        self.require_partition(&layout, partition)?;
        let tracker = MembershipTracker::new(&layout, self.host.directory.as_ref());

        let report = self
            .restarts
            .restore_after_restart(&tracker, &self.states, partition)?;

        if teleport_to_spawn {
            if let (Some(worlds), Some(spawn)) = (self.host.worlds.as_deref(), layout.catalog.spawn_for(partition)) {
                for &player in &report.restored {
                    if let Err(e) = worlds.teleport(player, spawn) {
                        warn!(%player, %partition, "Failed to teleport restored player: {}", e);
                    }
                }
            }
        }

        for &player in &report.restored {
            self.visibility
                .update_player(&tracker, self.host.visibility.as_ref(), player);
        }
        self.visibility
            .reconcile_partition(&tracker, self.host.visibility.as_ref(), partition);

        self.events.publish(PartitionEvent::RestartRestored {
            partition: partition.clone(),
            restored: report.restored.len(),
            dropped: report.dropped.len(),
        });
        Ok(report)
    }

    /// Full O(N²) sweep. Meant for explicit or periodic consistency checks.
    pub fn reconcile_all(&mut self) -> VisibilityReport {
        let layout = self.layout.load();
        let tracker = MembershipTracker::new(&layout, self.host.directory.as_ref());
        self.visibility
            .reconcile_all(&tracker, self.host.visibility.as_ref())
    }

    /// Teleports a player to their partition's spawn point.
    ///
    /// Returns `false` if the player is unpartitioned, the partition has no
    /// spawn, no world manager is bound, or the teleport failed.
    pub fn send_to_spawn(&self, player: PlayerId) -> bool {
        let layout = self.layout.load();
        let tracker = MembershipTracker::new(&layout, self.host.directory.as_ref());
        let Some(partition) = tracker.partition_for_player(player) else {
            return false;
        };
        let (Some(worlds), Some(spawn)) = (self.host.worlds.as_deref(), layout.catalog.spawn_for(&partition)) else {
            return false;
        };

        match worlds.teleport(player, spawn) {
            Ok(()) => true,
            Err(e) => {
                warn!(%player, %partition, "Failed to send player to spawn: {}", e);
                false
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn partition_for_player(&self, player: PlayerId) -> Option<PartitionId> {
        let layout = self.layout.load();
        MembershipTracker::new(&layout, self.host.directory.as_ref()).partition_for_player(player)
    }

    pub fn players_in_partition(&self, partition: &PartitionId) -> HashSet<PlayerId> {
        let layout = self.layout.load();
        MembershipTracker::new(&layout, self.host.directory.as_ref()).players_in_partition(partition)
    }

    pub fn online_count_for_partition(&self, partition: &PartitionId) -> usize {
        self.players_in_partition(partition).len()
    }

    pub fn are_players_in_same_partition(&self, a: PlayerId, b: PlayerId) -> bool {
        let layout = self.layout.load();
        MembershipTracker::new(&layout, self.host.directory.as_ref()).are_players_in_same_partition(a, b)
    }

    pub fn is_capability_active_in_partition(&self, name: &str, partition: &PartitionId) -> bool {
        self.layout
            .load()
            .capabilities
            .is_capability_active_in_partition(name, partition)
    }

    /// Whether both players currently render each other, per the cache.
    pub fn is_visible(&self, a: PlayerId, b: PlayerId) -> bool {
        !self.visibility.is_hidden(a, b) && !self.visibility.is_hidden(b, a)
    }

    pub fn filter_chat_recipients(&self, sender: PlayerId, recipients: &mut Vec<Recipient>) -> usize {
        let layout = self.layout.load();
        let tracker = MembershipTracker::new(&layout, self.host.directory.as_ref());
        ChatEnforcer::filter_recipients(&tracker, sender, recipients)
    }

    pub fn filter_completions(&self, requester: PlayerId, candidates: Vec<String>) -> Vec<String> {
        let layout = self.layout.load();
        let tracker = MembershipTracker::new(&layout, self.host.directory.as_ref());
        CompletionEnforcer::filter_completions(&tracker, requester, candidates)
    }

    pub fn status(&self) -> EngineStatus {
        let layout = self.layout.load();
        let tracker = MembershipTracker::new(&layout, self.host.directory.as_ref());
        let counts = tracker.partition_counts();
        let online_players = self.host.directory.online_players().len();
        let partitioned: usize = counts.values().sum();

        let partitions = layout
            .catalog
            .iter()
            .map(|p| PartitionStatus {
                id: p.id.clone(),
                name: p.name.clone(),
                enabled: p.enabled,
                persistent: p.persistent,
                online: counts.get(&p.id).copied().unwrap_or(0),
                worlds: p.worlds.len(),
            })
            .collect();

        EngineStatus {
            partitions,
            online_players,
            unpartitioned_players: online_players.saturating_sub(partitioned),
            hidden_pairs: self.visibility.hidden_pair_count(),
            open_sessions: self.states.open_session_count(),
            pending_restarts: self.restarts.pending(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PartitionDefinition;
    use crate::error::ConfigError;
    use crate::host::memory::{InMemoryHost, PrimitiveCall};
    use crate::state::ManualClock;
    use crate::types::{Position, SpawnPoint};
    use std::time::Duration;

    fn config() -> PartitionConfig {
        PartitionConfig {
            partitions: vec![
                PartitionDefinition::new("alpha")
                    .with_worlds(["alpha_1"])
                    .with_capabilities(["battle_royale"])
                    .with_spawn(SpawnPoint::new("alpha_1", Position::new(0.5, 64.0, 0.5))),
                PartitionDefinition::new("beta").with_worlds(["beta_1"]),
            ],
            ..Default::default()
        }
    }

    fn engine(host: &Arc<InMemoryHost>) -> (PartitionEngine, ManualClock) {
        let clock = ManualClock::starting_at(0);
        let engine = PartitionEngine::new(HostBindings::from_host(host.clone()), &config())
            .unwrap()
            .with_state_store(PlayerStateStore::with_clock(Arc::new(clock.clone())));
        (engine, clock)
    }

    #[test]
    fn test_initialize_loads_worlds_and_hides() {
        let host = Arc::new(InMemoryHost::new());
        let x = host.connect("x", "alpha_1");
        let y = host.connect("y", "beta_1");
        let (mut engine, _) = engine(&host);

        let report = engine.initialize();
        assert_eq!(report.hidden, 2);
        assert!(!engine.is_visible(x, y));
        assert_eq!(engine.state_store().open_session_count(), 2);

        let calls = host.calls();
        assert!(calls.contains(&PrimitiveCall::LoadWorld(WorldId::from("alpha_1"))));
        assert!(calls.iter().any(|c| matches!(c, PrimitiveCall::Border { .. })));
    }

    #[test]
    fn test_unavailable_world_does_not_block_initialize() {
        let host = Arc::new(InMemoryHost::new());
        host.mark_world_unavailable("alpha_1");
        let x = host.connect("x", "alpha_1");
        let (mut engine, _) = engine(&host);

        engine.initialize();
        let calls = host.calls();
        assert!(!calls.contains(&PrimitiveCall::LoadWorld(WorldId::from("alpha_1"))));
        assert!(calls.contains(&PrimitiveCall::LoadWorld(WorldId::from("beta_1"))));
        assert_eq!(engine.partition_for_player(x), Some(PartitionId::from("alpha")));
    }

    #[test]
    fn test_world_change_moves_sessions_and_events() {
        let host = Arc::new(InMemoryHost::new());
        let x = host.connect("x", "alpha_1");
        let y = host.connect("y", "beta_1");
        let (mut engine, clock) = engine(&host);
        engine.initialize();
        let mut events = engine.subscribe();

        clock.advance(Duration::from_secs(10));
        let from = host.move_to(x, "beta_1").unwrap();
        engine.on_player_world_change(x, &from, &WorldId::from("beta_1"));

        assert!(engine.is_visible(x, y));
        assert!(host.can_see(x, y));
        let alpha = PartitionId::from("alpha");
        let beta = PartitionId::from("beta");
        assert_eq!(engine.state_store().active_time(&alpha, x), Duration::from_secs(10));
        assert!(engine.state_store().get(&beta, x).unwrap().session_open);

        assert!(matches!(events.try_recv().unwrap(), PartitionEvent::PlayerLeftPartition { partition, .. } if partition == alpha));
        assert!(matches!(events.try_recv().unwrap(), PartitionEvent::PlayerEnteredPartition { partition, .. } if partition == beta));
    }

    #[test]
    fn test_disconnect_after_host_removal() {
        let host = Arc::new(InMemoryHost::new());
        let x = host.connect("x", "alpha_1");
        let y = host.connect("y", "beta_1");
        let (mut engine, clock) = engine(&host);
        engine.initialize();

        clock.advance(Duration::from_secs(7));
        host.disconnect(x);
        engine.on_player_disconnect(x);

        assert_eq!(engine.visibility().hidden_from(y), Vec::<PlayerId>::new());
        let state = engine.state_store().get(&PartitionId::from("alpha"), x).unwrap();
        assert!(!state.session_open);
        assert_eq!(state.active_time, Duration::from_secs(7));
    }

    #[test]
    fn test_invalid_reload_keeps_previous_layout() {
        let host = Arc::new(InMemoryHost::new());
        let x = host.connect("x", "alpha_1");
        let (mut engine, _) = engine(&host);
        engine.initialize();

        let mut bad = config();
        bad.partitions[1].worlds.push(WorldId::from("alpha_1"));
        let result = engine.reload(&bad);

        assert!(matches!(
            result,
            Err(EngineError::Config(ConfigError::DuplicateWorld { .. }))
        ));
        assert_eq!(engine.partition_for_player(x), Some(PartitionId::from("alpha")));
    }

    #[test]
    fn test_unchanged_reload_is_noop() {
        let host = Arc::new(InMemoryHost::new());
        let x = host.connect("x", "alpha_1");
        let (mut engine, clock) = engine(&host);
        engine.initialize();
        clock.advance(Duration::from_secs(5));
        let before = engine.state_store().get(&PartitionId::from("alpha"), x);
        host.clear_calls();

        let report = engine.reload(&config()).unwrap();
        assert!(!report.changed);
        assert!(host.calls().is_empty());
        assert_eq!(engine.state_store().get(&PartitionId::from("alpha"), x), before);
    }

    #[test]
    fn test_reload_moves_players_between_partitions() {
        let host = Arc::new(InMemoryHost::new());
        let x = host.connect("x", "alpha_1");
        let y = host.connect("y", "beta_1");
        let (mut engine, _) = engine(&host);
        engine.initialize();
        assert!(!host.can_see(x, y));

        let mut merged = config();
        merged.partitions[1].worlds.clear();
        merged.partitions[0].worlds.push(WorldId::from("beta_1"));
        let report = engine.reload(&merged).unwrap();

        assert!(report.changed);
        assert_eq!(report.moved_players, 1);
        assert!(host.can_see(x, y) && host.can_see(y, x));
        assert_eq!(engine.partition_for_player(y), Some(PartitionId::from("alpha")));
    }

    #[test]
    fn test_restart_unknown_partition() {
        let host = Arc::new(InMemoryHost::new());
        let (mut engine, _) = engine(&host);
        let missing = PartitionId::from("missing");
        assert!(matches!(
            engine.prepare_restart(&missing),
            Err(EngineError::UnknownPartition(_))
        ));
    }

    #[test]
    fn test_restore_teleports_to_spawn() {
        let host = Arc::new(InMemoryHost::new());
        let x = host.connect("x", "alpha_1");
        let (mut engine, _) = engine(&host);
        engine.initialize();
        let alpha = PartitionId::from("alpha");

        engine.prepare_restart(&alpha).unwrap();
        host.clear_calls();
        let report = engine.restore_after_restart(&alpha, true).unwrap();

        assert_eq!(report.restored, vec![x]);
        assert!(host
            .calls()
            .iter()
            .any(|c| matches!(c, PrimitiveCall::Teleport { player, .. } if *player == x)));
    }

    #[test]
    fn test_restore_while_unmapped_does_not_open_session() {
        let host = Arc::new(InMemoryHost::new());
        let x = host.connect("x", "alpha_1");
        let (mut engine, clock) = engine(&host);
        engine.initialize();
        let alpha = PartitionId::from("alpha");
        let beta = PartitionId::from("beta");

        clock.advance(Duration::from_secs(10));
        engine.prepare_restart(&alpha).unwrap();
        let from = host.move_to(x, "lobby").unwrap();
        engine.on_player_world_change(x, &from, &WorldId::from("lobby"));

        let report = engine.restore_after_restart(&alpha, false).unwrap();
        assert_eq!(report.restored, vec![x]);
        assert!(!engine.state_store().get(&alpha, x).unwrap().session_open);

        let from = host.move_to(x, "beta_1").unwrap();
        engine.on_player_world_change(x, &from, &WorldId::from("beta_1"));
        clock.advance(Duration::from_secs(1000));

        let store = engine.state_store();
        assert_eq!(engine.partition_for_player(x), Some(beta.clone()));
        assert!(!store.get(&alpha, x).unwrap().session_open);
        assert_eq!(store.active_time(&alpha, x), Duration::from_secs(10));
        assert!(store.get(&beta, x).unwrap().session_open);
        assert_eq!(store.open_session_count(), 1);
    }

    #[test]
    fn test_shutdown_reveals_and_clears() {
        let host = Arc::new(InMemoryHost::new());
        let x = host.connect("x", "alpha_1");
        let y = host.connect("y", "beta_1");
        let (mut engine, _) = engine(&host);
        engine.initialize();

        let report = engine.shutdown();
        assert_eq!(report.shown, 2);
        assert!(host.can_see(x, y) && host.can_see(y, x));
        assert!(engine.state_store().is_empty());
    }

    #[test]
    fn test_status_and_queries() {
        let host = Arc::new(InMemoryHost::new());
        let x = host.connect("x", "alpha_1");
        host.connect("y", "beta_1");
        host.connect("l", "lobby");
        let (mut engine, _) = engine(&host);
        engine.initialize();

        let status = engine.status();
        assert_eq!(status.online_players, 3);
        assert_eq!(status.unpartitioned_players, 1);
        assert_eq!(status.hidden_pairs, 2);
        assert_eq!(status.partitions[0].online, 1);

        assert!(engine.is_capability_active_in_partition("battle_royale", &PartitionId::from("alpha")));
        assert!(!engine.is_capability_active_in_partition("battle_royale", &PartitionId::from("beta")));
        assert!(engine.send_to_spawn(x));
    }
}
