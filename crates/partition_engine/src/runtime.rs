//! # Engine Runtime
//!
//! Runs a [`PartitionEngine`] as the single authoritative mutation task and
//! hands out cheap, cloneable [`PartitionHandle`]s to everyone else.
//!
//! ## Key Types
//!
//! - [`EngineRuntime`] - spawns the actor task
//! - [`PartitionHandle`] - the published service; reads go straight to the
//!   shared layout and state store, mutations are queued onto the actor
//! - [`PartitionService`] - the capability interface collaborators code
//!   against
//! - [`DisabledPartitions`] - what collaborators get when no engine is bound
//!
//! Commands are processed strictly in arrival order, so events affecting the
//! same player can never be reordered.

use crate::config::PartitionConfig;
use crate::engine::{EngineStatus, PartitionEngine, ReloadReport};
use crate::error::{EngineError, EngineResult};
use crate::events::{EventBus, PartitionEvent};
use crate::host::PlayerDirectory;
use crate::isolation::{ChatEnforcer, CompletionEnforcer, Recipient};
use crate::layout::SharedLayout;
use crate::membership::MembershipTracker;
use crate::restart::{RestartSnapshot, RestoreReport};
use crate::state::PlayerStateStore;
use crate::types::{PartitionId, PlayerId, WorldId};
use crate::visibility::VisibilityReport;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capacity of the command queue feeding the engine task.
pub const COMMAND_QUEUE_CAPACITY: usize = 1024;

// ============================================================================
// Commands
// ============================================================================

/// A unit of work for the engine task. Every command carries a reply channel.
#[derive(Debug)]
pub enum EngineCommand {
    PlayerConnected {
        player: PlayerId,
        reply: oneshot::Sender<VisibilityReport>,
    },
    PlayerDisconnected {
        player: PlayerId,
        reply: oneshot::Sender<VisibilityReport>,
    },
    WorldChanged {
        player: PlayerId,
        from: WorldId,
        to: WorldId,
        reply: oneshot::Sender<VisibilityReport>,
    },
    Reload {
        config: Box<PartitionConfig>,
        reply: oneshot::Sender<EngineResult<ReloadReport>>,
    },
    PrepareRestart {
        partition: PartitionId,
        reply: oneshot::Sender<EngineResult<RestartSnapshot>>,
    },
    RestoreAfterRestart {
        partition: PartitionId,
        teleport_to_spawn: bool,
        reply: oneshot::Sender<EngineResult<RestoreReport>>,
    },
    ReconcileAll {
        reply: oneshot::Sender<VisibilityReport>,
    },
    SendToSpawn {
        player: PlayerId,
        reply: oneshot::Sender<bool>,
    },
    IsVisible {
        a: PlayerId,
        b: PlayerId,
        reply: oneshot::Sender<bool>,
    },
    Status {
        reply: oneshot::Sender<EngineStatus>,
    },
    Shutdown {
        reply: oneshot::Sender<VisibilityReport>,
    },
}

pub struct EngineRuntime;

impl EngineRuntime {
    /// Initializes the engine and moves it onto its own task.
    ///
    /// Must be called from within a tokio runtime. The task ends after a
    /// `Shutdown` command or once every handle has been dropped.
    pub fn spawn(mut engine: PartitionEngine) -> (PartitionHandle, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let handle = PartitionHandle {
            commands: sender,
            layout: engine.shared_layout(),
            directory: Arc::clone(&engine.host().directory),
            states: engine.state_store().clone(),
            events: engine.event_bus().clone(),
        };

        let task = tokio::spawn(async move {
            engine.initialize();
            info!("🎯 Partition engine task started");

            while let Some(command) = receiver.recv().await {
                if !Self::dispatch(&mut engine, command) {
                    break;
                }
            }

            info!("🛑 Partition engine task stopped");
        });

        (handle, task)
    }

    /// Runs one command. Returns false when the task should stop.
    fn dispatch(engine: &mut PartitionEngine, command: EngineCommand) -> bool {
        // A dropped reply receiver only means the caller stopped waiting
        match command {
            EngineCommand::PlayerConnected { player, reply } => {
                let _ = reply.send(engine.on_player_connect(player));
            }
            EngineCommand::PlayerDisconnected { player, reply } => {
                let _ = reply.send(engine.on_player_disconnect(player));
            }
            EngineCommand::WorldChanged { player, from, to, reply } => {
                let _ = reply.send(engine.on_player_world_change(player, &from, &to));
            }
            EngineCommand::Reload { config, reply } => {
                let _ = reply.send(engine.reload(&config));
            }
            EngineCommand::PrepareRestart { partition, reply } => {
                let _ = reply.send(engine.prepare_restart(&partition));
            }
            EngineCommand::RestoreAfterRestart {
                partition,
                teleport_to_spawn,
                reply,
            } => {
                let _ = reply.send(engine.restore_after_restart(&partition, teleport_to_spawn));
            }
            EngineCommand::ReconcileAll { reply } => {
                let _ = reply.send(engine.reconcile_all());
            }
            EngineCommand::SendToSpawn { player, reply } => {
                let _ = reply.send(engine.send_to_spawn(player));
            }
            EngineCommand::IsVisible { a, b, reply } => {
                let _ = reply.send(engine.is_visible(a, b));
            }
            EngineCommand::Status { reply } => {
                let _ = reply.send(engine.status());
            }
            EngineCommand::Shutdown { reply } => {
                let _ = reply.send(engine.shutdown());
                return false;
            }
        }
        true
    }
}

// ============================================================================
// Service
// ============================================================================

/// What partition-aware collaborators (chat, scoreboards, minigames) see of
/// the engine.
#[async_trait]
pub trait PartitionService: Send + Sync {
    fn partition_for_player(&self, player: PlayerId) -> Option<PartitionId>;

    fn players_in_partition(&self, partition: &PartitionId) -> HashSet<PlayerId>;

    fn online_count_for_partition(&self, partition: &PartitionId) -> usize {
        self.players_in_partition(partition).len()
    }

    fn are_players_in_same_partition(&self, a: PlayerId, b: PlayerId) -> bool;

    fn is_capability_active_in_partition(&self, name: &str, partition: &PartitionId) -> bool;

    /// Resolves the player's partition first; unpartitioned players have no
    /// capabilities.
    fn is_capability_active_for_player(&self, name: &str, player: PlayerId) -> bool {
        self.partition_for_player(player)
            .map(|partition| self.is_capability_active_in_partition(name, &partition))
            .unwrap_or(false)
    }

    /// Accumulated time the player spent in a partition.
    fn active_time(&self, partition: &PartitionId, player: PlayerId) -> Duration;

    fn filter_chat_recipients(&self, sender: PlayerId, recipients: &mut Vec<Recipient>) -> usize;

    fn filter_completions(&self, requester: PlayerId, candidates: Vec<String>) -> Vec<String>;

    fn subscribe(&self) -> broadcast::Receiver<PartitionEvent>;

    /// Queues a full visibility sweep and waits for it.
    async fn request_reconcile(&self) -> EngineResult<VisibilityReport>;
}

/// Cloneable handle to a running engine.
#[derive(Clone)]
pub struct PartitionHandle {
    commands: mpsc::Sender<EngineCommand>,
    layout: SharedLayout,
    directory: Arc<dyn PlayerDirectory>,
    states: PlayerStateStore,
    events: EventBus,
}

impl std::fmt::Debug for PartitionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionHandle")
            .field("running", &self.is_running())
            .field("directory", &"[directory]")
            .field("states", &self.states)
            .finish()
    }
}

impl PartitionHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> EngineResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| EngineError::NotRunning)?;
        response.await.map_err(|_| EngineError::NotRunning)
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    pub fn state_store(&self) -> &PlayerStateStore {
        &self.states
    }

    pub fn shared_layout(&self) -> &SharedLayout {
        &self.layout
    }

    pub async fn player_connected(&self, player: PlayerId) -> EngineResult<VisibilityReport> {
        self.request(|reply| EngineCommand::PlayerConnected { player, reply })
            .await
    }

    pub async fn player_disconnected(&self, player: PlayerId) -> EngineResult<VisibilityReport> {
        self.request(|reply| EngineCommand::PlayerDisconnected { player, reply })
            .await
    }

    pub async fn world_changed(&self, player: PlayerId, from: WorldId, to: WorldId) -> EngineResult<VisibilityReport> {
        self.request(|reply| EngineCommand::WorldChanged { player, from, to, reply })
            .await
    }

    /// Queues a reload. Read the configuration file before calling this;
    /// the engine task never does I/O.
    pub async fn reload(&self, config: PartitionConfig) -> EngineResult<ReloadReport> {
        self.request(|reply| EngineCommand::Reload {
            config: Box::new(config),
            reply,
        })
        .await?
    }

    pub async fn prepare_restart(&self, partition: PartitionId) -> EngineResult<RestartSnapshot> {
        self.request(|reply| EngineCommand::PrepareRestart { partition, reply })
            .await?
    }

    pub async fn restore_after_restart(
        &self,
        partition: PartitionId,
        teleport_to_spawn: bool,
    ) -> EngineResult<RestoreReport> {
        self.request(|reply| EngineCommand::RestoreAfterRestart {
            partition,
            teleport_to_spawn,
            reply,
        })
        .await?
    }

    pub async fn reconcile_all(&self) -> EngineResult<VisibilityReport> {
        self.request(|reply| EngineCommand::ReconcileAll { reply }).await
    }

    pub async fn send_to_spawn(&self, player: PlayerId) -> EngineResult<bool> {
        self.request(|reply| EngineCommand::SendToSpawn { player, reply })
            .await
    }

    /// Whether the engine currently lets `a` and `b` see each other.
    pub async fn is_visible(&self, a: PlayerId, b: PlayerId) -> EngineResult<bool> {
        self.request(|reply| EngineCommand::IsVisible { a, b, reply })
            .await
    }

    pub async fn status(&self) -> EngineResult<EngineStatus> {
        self.request(|reply| EngineCommand::Status { reply }).await
    }

    /// Stops the engine task after revealing every hidden pair.
    pub async fn shutdown(&self) -> EngineResult<VisibilityReport> {
        let report = self.request(|reply| EngineCommand::Shutdown { reply }).await?;
        debug!(shown = report.shown, "Partition engine shutdown acknowledged");
        Ok(report)
    }
}

#[async_trait]
impl PartitionService for PartitionHandle {
    fn partition_for_player(&self, player: PlayerId) -> Option<PartitionId> {
        let layout = self.layout.load();
        MembershipTracker::new(&layout, self.directory.as_ref()).partition_for_player(player)
    }

    fn players_in_partition(&self, partition: &PartitionId) -> HashSet<PlayerId> {
        let layout = self.layout.load();
        MembershipTracker::new(&layout, self.directory.as_ref()).players_in_partition(partition)
    }

    fn are_players_in_same_partition(&self, a: PlayerId, b: PlayerId) -> bool {
        let layout = self.layout.load();
        MembershipTracker::new(&layout, self.directory.as_ref()).are_players_in_same_partition(a, b)
    }

    fn is_capability_active_in_partition(&self, name: &str, partition: &PartitionId) -> bool {
        self.layout
            .load()
            .capabilities
            .is_capability_active_in_partition(name, partition)
    }

    fn active_time(&self, partition: &PartitionId, player: PlayerId) -> Duration {
        self.states.active_time(partition, player)
    }

    fn filter_chat_recipients(&self, sender: PlayerId, recipients: &mut Vec<Recipient>) -> usize {
        let layout = self.layout.load();
        let tracker = MembershipTracker::new(&layout, self.directory.as_ref());
        ChatEnforcer::filter_recipients(&tracker, sender, recipients)
    }

    fn filter_completions(&self, requester: PlayerId, candidates: Vec<String>) -> Vec<String> {
        let layout = self.layout.load();
        let tracker = MembershipTracker::new(&layout, self.directory.as_ref());
        CompletionEnforcer::filter_completions(&tracker, requester, candidates)
    }

    fn subscribe(&self) -> broadcast::Receiver<PartitionEvent> {
        self.events.subscribe()
    }

    async fn request_reconcile(&self) -> EngineResult<VisibilityReport> {
        self.reconcile_all().await
    }
}

// ============================================================================
// Partitioning disabled
// ============================================================================

/// Stand-in used when no engine is bound: nobody is partitioned, nothing is
/// isolated, and every capability is active everywhere.
#[derive(Debug, Clone, Default)]
pub struct DisabledPartitions {
    events: EventBus,
}

#[async_trait]
impl PartitionService for DisabledPartitions {
    fn partition_for_player(&self, _player: PlayerId) -> Option<PartitionId> {
        None
    }

    fn players_in_partition(&self, _partition: &PartitionId) -> HashSet<PlayerId> {
        HashSet::new()
    }

    fn are_players_in_same_partition(&self, _a: PlayerId, _b: PlayerId) -> bool {
        true
    }

    fn is_capability_active_in_partition(&self, _name: &str, _partition: &PartitionId) -> bool {
        true
    }

    fn is_capability_active_for_player(&self, _name: &str, _player: PlayerId) -> bool {
        true
    }

    fn active_time(&self, _partition: &PartitionId, _player: PlayerId) -> Duration {
        Duration::ZERO
    }

    fn filter_chat_recipients(&self, _sender: PlayerId, _recipients: &mut Vec<Recipient>) -> usize {
        0
    }

    fn filter_completions(&self, _requester: PlayerId, candidates: Vec<String>) -> Vec<String> {
        candidates
    }

    fn subscribe(&self) -> broadcast::Receiver<PartitionEvent> {
        self.events.subscribe()
    }

    async fn request_reconcile(&self) -> EngineResult<VisibilityReport> {
        Ok(VisibilityReport::default())
    }
}

/// Resolves an optional engine binding to a usable service.
pub fn service_or_disabled(service: Option<Arc<dyn PartitionService>>) -> Arc<dyn PartitionService> {
    match service {
        Some(service) => service,
        None => {
            warn!("⚠️ No partition service bound, partitioning disabled");
            Arc::new(DisabledPartitions::default())
        }
    }
}
