//! # Core Type Definitions
//!
//! Identifier and geometry types shared by every part of the partition engine.
//!
//! ## Key Types
//!
//! - [`PlayerId`] - Unique identifier for a connected player
//! - [`PartitionId`] - Stable string identifier of a partition
//! - [`WorldId`] - Identifier of a world instance owned by the host
//! - [`CapabilityName`] - Name of an external capability (plugin) scoped to partitions
//! - [`SpawnPoint`] - World, position and orientation players are sent to
//!
//! ## Design Principles
//!
//! - **Type Safety**: Wrapper types prevent mixing up world ids and partition ids,
//!   which are both plain strings in configuration files
//! - **Serialization**: All types round-trip through TOML and JSON

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a player in the game process.
///
/// This is a wrapper around UUID that provides type safety and ensures
/// player IDs cannot be confused with other types of IDs in the system.
///
/// # Examples
///
/// ```rust
/// use partition_engine::PlayerId;
///
/// let player_id = PlayerId::new();
/// let parsed: PlayerId = player_id.to_string().parse().unwrap();
/// assert_eq!(player_id, parsed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Creates a new random player ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::str::FromStr for PlayerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Creates the identifier from anything string-like.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrows the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Stable identifier of a partition, as written in the configuration.
    PartitionId
}

string_id! {
    /// Identifier of a world instance. Worlds are owned by the host runtime;
    /// the engine only maps them onto partitions.
    WorldId
}

string_id! {
    /// Name of an external capability (usually a plugin) that can be
    /// switched on per partition.
    CapabilityName
}

// ============================================================================
// Geometry
// ============================================================================

/// Represents a 3D position in a world.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate (east-west axis)
    pub x: f64,
    /// Y coordinate (vertical axis)
    pub y: f64,
    /// Z coordinate (north-south axis)
    pub z: f64,
}

impl Position {
    /// Creates a new position with the specified coordinates.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Where players of a partition are sent: a world plus a pose inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub world: WorldId,
    #[serde(flatten)]
    pub position: Position,
    #[serde(default)]
    pub yaw: f32,
    #[serde(default)]
    pub pitch: f32,
}

impl SpawnPoint {
    pub fn new(world: impl Into<WorldId>, position: Position) -> Self {
        Self {
            world: world.into(),
            position,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    pub fn with_orientation(mut self, yaw: f32, pitch: f32) -> Self {
        self.yaw = yaw;
        self.pitch = pitch;
        self
    }
}

/// Current time as milliseconds since the Unix epoch.
///
/// Returns 0 if the system clock is set before the epoch.
pub fn current_timestamp_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
