//! Partition Engine - world-group isolation for a multi-world game server
//!
//! Splits one server process into logically isolated partitions, each owning
//! a group of worlds. Players in different partitions cannot see each other,
//! chat with each other or tab-complete each other's names, while sharing the
//! same process and per-player partition state.
//!
//! - Partition definitions and the world→partition index, rebuilt atomically
//!   on reload
//! - Membership derived from the player's current world, never stored
//! - Visibility engine with a per-viewer hidden-set cache
//! - Chat, completion, player-list and world-border enforcers
//! - Capability scoping per partition
//! - Per-player partition state with session accounting
//! - Partition restarts that keep everyone connected
//!
//! The engine is driven through [`EngineRuntime`], which owns it on a single
//! task and hands out [`PartitionHandle`]s implementing [`PartitionService`].

pub mod capability;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod host;
pub mod index;
pub mod isolation;
pub mod layout;
pub mod membership;
pub mod restart;
pub mod runtime;
pub mod state;
pub mod types;
pub mod visibility;

pub use capability::CapabilityTable;
pub use catalog::{Partition, PartitionCatalog};
pub use config::{PartitionConfig, PartitionDefinition};
pub use engine::{EngineStatus, PartitionEngine, PartitionStatus, ReloadReport};
pub use error::{ConfigError, ConfigResult, EngineError, EngineResult, HostError, HostResult};
pub use events::{EventBus, PartitionEvent};
pub use host::memory::InMemoryHost;
pub use host::{HostBindings, PlayerDirectory, VisibilityPrimitive, WorldManager};
pub use index::WorldIndex;
pub use isolation::{IsolationSettings, Recipient};
pub use layout::{PartitionLayout, SharedLayout};
pub use membership::MembershipTracker;
pub use restart::{RestartCoordinator, RestartSnapshot, RestoreReport};
pub use runtime::{service_or_disabled, DisabledPartitions, EngineRuntime, PartitionHandle, PartitionService};
pub use state::{Clock, ManualClock, PlayerPartitionState, PlayerStateStore, SystemClock};
pub use types::{CapabilityName, PartitionId, PlayerId, Position, SpawnPoint, WorldId};
pub use visibility::{VisibilityEngine, VisibilityReport};
