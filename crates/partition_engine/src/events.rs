//! Notifications published by the engine.
//!
//! Chat, tablist and scoreboard-style collaborators subscribe to these instead
//! of polling membership. Delivery is best-effort: with no subscriber the
//! event is dropped.

use crate::types::{PartitionId, PlayerId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Capacity of the broadcast channel. Slow subscribers lag and miss events
/// rather than blocking the engine.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PartitionEvent {
    PlayerEnteredPartition {
        player: PlayerId,
        partition: PartitionId,
        timestamp: u64,
    },
    PlayerLeftPartition {
        player: PlayerId,
        partition: PartitionId,
        timestamp: u64,
    },
    LayoutReloaded {
        partitions: usize,
        moved_players: usize,
        timestamp: u64,
    },
    RestartPrepared {
        partition: PartitionId,
        players: usize,
    },
    RestartRestored {
        partition: PartitionId,
        restored: usize,
        dropped: usize,
    },
    ShutdownComplete,
}

/// Sending half of the engine's event channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PartitionEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PartitionEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: PartitionEvent) {
        if self.sender.send(event).is_err() {
            trace!("No partition event subscribers");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(PartitionEvent::ShutdownComplete);
        assert_eq!(rx.recv().await.unwrap(), PartitionEvent::ShutdownComplete);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.publish(PartitionEvent::ShutdownComplete);
    }

    #[test]
    fn test_event_json_shape() {
        let event = PartitionEvent::RestartPrepared {
            partition: PartitionId::from("alpha"),
            players: 3,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "restart_prepared");
        assert_eq!(json["partition"], "alpha");
    }
}
