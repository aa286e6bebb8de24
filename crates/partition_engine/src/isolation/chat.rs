//! Chat recipient filtering.

use crate::membership::MembershipTracker;
use crate::types::PlayerId;
use tracing::trace;

/// A candidate receiver of a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Player(PlayerId),
    /// Console, log sinks and other non-player receivers
    Console(String),
}

pub struct ChatEnforcer;

impl ChatEnforcer {
    /// Removes player recipients outside the sender's partition.
    ///
    /// Non-player recipients are never removed. Nothing is filtered when the
    /// toggle is off or the sender's partition is unresolved. Returns the
    /// number of recipients removed.
    pub fn filter_recipients(
        tracker: &MembershipTracker<'_>,
        sender: PlayerId,
        recipients: &mut Vec<Recipient>,
    ) -> usize {
        if !tracker.layout().isolation.chat {
            return 0;
        }
        let Some(sender_partition) = tracker.partition_for_player(sender) else {
            return 0;
        };

        let before = recipients.len();
        recipients.retain(|recipient| match recipient {
            Recipient::Player(player) if *player == sender => true,
            Recipient::Player(player) => {
                tracker.partition_for_player(*player).as_ref() == Some(&sender_partition)
            }
            Recipient::Console(_) => true,
        });

        let removed = before - recipients.len();
        if removed > 0 {
            trace!(%sender, partition = %sender_partition, removed, "Filtered chat recipients");
        }
        removed
    }
}
