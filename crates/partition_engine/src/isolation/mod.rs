//! Isolation enforcers.
//!
//! Four independent filters, each gated by its own toggle in
//! [`IsolationSettings`]. They hold no state of their own and consult the
//! membership tracker per call.

pub mod border;
pub mod chat;
pub mod completion;
pub mod tablist;

pub use border::WorldBorderEnforcer;
pub use chat::{ChatEnforcer, Recipient};
pub use completion::CompletionEnforcer;
pub use tablist::TabListEnforcer;

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Process-wide isolation toggles, replaced atomically on reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolationSettings {
    /// Filter chat recipients to the sender's partition
    #[serde(default = "default_true")]
    pub chat: bool,
    /// Hide players of other partitions (world rendering and player list)
    #[serde(default = "default_true")]
    pub tablist: bool,
    /// Filter player-name command completions
    #[serde(default = "default_true")]
    pub commands: bool,
    /// Confine each partition's worlds with a border
    #[serde(default = "default_true")]
    pub world_border: bool,
}

impl Default for IsolationSettings {
    fn default() -> Self {
        Self {
            chat: true,
            tablist: true,
            commands: true,
            world_border: true,
        }
    }
}

impl IsolationSettings {
    /// Every toggle off.
    pub fn disabled() -> Self {
        Self {
            chat: false,
            tablist: false,
            commands: false,
            world_border: false,
        }
    }

    /// Whether the visibility engine hides players of other partitions.
    /// When this is off every player sees every other player.
    pub fn hides_players(&self) -> bool {
        self.tablist
    }

    /// Whether any player-facing isolation is on.
    pub fn any_enabled(&self) -> bool {
        self.chat || self.tablist || self.commands
    }
}
