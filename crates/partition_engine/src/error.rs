//! Error types for the partition engine

use crate::types::{PartitionId, PlayerId, WorldId};
use std::{io::Error as IoError, path::PathBuf};
use thiserror::Error;

/// Configuration errors. Any of these aborts a load or reload and leaves the
/// previously active layout in place.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration {0}: {1}")]
    FileRead(PathBuf, IoError),

    #[error("Failed to write configuration {0}: {1}")]
    FileWrite(PathBuf, IoError),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Partition id cannot be empty")]
    EmptyPartitionId,

    #[error("Partition '{0}' is defined more than once")]
    DuplicatePartition(PartitionId),

    #[error("Partition '{0}' lists an empty world name")]
    EmptyWorldId(PartitionId),

    #[error("World '{world}' is claimed by both partition '{first}' and partition '{second}'")]
    DuplicateWorld {
        world: WorldId,
        first: PartitionId,
        second: PartitionId,
    },

    #[error("Spawn world '{world}' of partition '{partition}' is not one of its member worlds")]
    SpawnOutsidePartition {
        partition: PartitionId,
        world: WorldId,
    },
}

/// Failures reported by host primitives (show/hide, teleport, world loading).
///
/// These are transient per-player failures; the engine logs and skips them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("Player {0} is not connected")]
    PlayerOffline(PlayerId),

    #[error("World '{0}' is not available")]
    WorldUnavailable(WorldId),

    #[error("Host primitive failed: {0}")]
    Primitive(String),
}

/// Errors surfaced by the engine runtime and its service handle.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unknown partition '{0}'")]
    UnknownPartition(PartitionId),

    #[error("No restart snapshot for partition '{0}'")]
    NoRestartSnapshot(PartitionId),

    #[error("Partition engine is not running")]
    NotRunning,
}

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type HostResult<T> = Result<T, HostError>;
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_world_message_names_everything() {
        let err = ConfigError::DuplicateWorld {
            world: WorldId::from("arena"),
            first: PartitionId::from("alpha"),
            second: PartitionId::from("beta"),
        };
        let message = err.to_string();
        assert!(message.contains("arena"));
        assert!(message.contains("alpha"));
        assert!(message.contains("beta"));
    }

    #[test]
    fn test_engine_error_wraps_config_error() {
        let err: EngineError = ConfigError::EmptyPartitionId.into();
        assert!(matches!(err, EngineError::Config(ConfigError::EmptyPartitionId)));
    }
}
