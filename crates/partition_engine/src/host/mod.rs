//! Seams to the host game runtime.
//!
//! The engine never owns players or worlds. It reads "who is online and in
//! which world" through [`PlayerDirectory`], mutates what players see through
//! [`VisibilityPrimitive`], and optionally asks a [`WorldManager`] to load
//! worlds, teleport players and apply world borders.
//!
//! All primitives are called from the engine's single mutation task.

pub mod memory;

use crate::error::HostResult;
use crate::types::{PartitionId, PlayerId, SpawnPoint, WorldId};
use std::fmt;
use std::sync::Arc;

/// Read access to the host's live player population.
pub trait PlayerDirectory: Send + Sync {
    /// Every currently connected player.
    fn online_players(&self) -> Vec<PlayerId>;

    /// The world a player is currently in, `None` if they are not connected.
    fn current_world(&self, player: PlayerId) -> Option<WorldId>;

    /// Resolves a player name (as typed in chat or a command) to a connected
    /// player.
    fn player_by_name(&self, name: &str) -> Option<PlayerId>;

    fn is_online(&self, player: PlayerId) -> bool {
        self.current_world(player).is_some()
    }
}

/// The expensive show/hide operation between two live entities.
pub trait VisibilityPrimitive: Send + Sync {
    fn show_player(&self, viewer: PlayerId, target: PlayerId) -> HostResult<()>;

    fn hide_player(&self, viewer: PlayerId, target: PlayerId) -> HostResult<()>;
}

/// Optional world management integration.
pub trait WorldManager: Send + Sync {
    fn load_world(&self, world: &WorldId) -> HostResult<()>;

    /// Moves a player to a spawn point. The host reports the resulting world
    /// change through the normal world-change event.
    fn teleport(&self, player: PlayerId, spawn: &SpawnPoint) -> HostResult<()>;

    /// Confines a partition's worlds with a border.
    fn apply_border(&self, partition: &PartitionId, worlds: &[WorldId]) -> HostResult<()>;
}

/// The set of host integrations the engine is constructed with.
#[derive(Clone)]
pub struct HostBindings {
    pub directory: Arc<dyn PlayerDirectory>,
    pub visibility: Arc<dyn VisibilityPrimitive>,
    pub worlds: Option<Arc<dyn WorldManager>>,
}

impl HostBindings {
    pub fn new(directory: Arc<dyn PlayerDirectory>, visibility: Arc<dyn VisibilityPrimitive>) -> Self {
        Self {
            directory,
            visibility,
            worlds: None,
        }
    }

    pub fn with_world_manager(mut self, worlds: Arc<dyn WorldManager>) -> Self {
        self.worlds = Some(worlds);
        self
    }

    /// Binds every seam to one host object.
    pub fn from_host<H>(host: Arc<H>) -> Self
    where
        H: PlayerDirectory + VisibilityPrimitive + WorldManager + 'static,
    {
        Self {
            directory: host.clone(),
            visibility: host.clone(),
            worlds: Some(host),
        }
    }
}

impl fmt::Debug for HostBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostBindings")
            .field("directory", &"[directory]")
            .field("visibility", &"[visibility]")
            .field("worlds", &self.worlds.is_some())
            .finish()
    }
}
