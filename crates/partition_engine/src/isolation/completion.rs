//! Command-completion filtering.

use crate::membership::MembershipTracker;
use crate::types::PlayerId;

pub struct CompletionEnforcer;

impl CompletionEnforcer {
    /// Drops completions naming an online player of another partition.
    ///
    /// Candidates that do not resolve to an online player (subcommands,
    /// world names, offline players) pass through untouched, as does
    /// everything when the toggle is off or the requester is unresolved.
    pub fn filter_completions(
        tracker: &MembershipTracker<'_>,
        requester: PlayerId,
        candidates: Vec<String>,
    ) -> Vec<String> {
        if !tracker.layout().isolation.commands {
            return candidates;
        }
        let Some(requester_partition) = tracker.partition_for_player(requester) else {
            return candidates;
        };

        candidates
            .into_iter()
            .filter(|candidate| match tracker.directory().player_by_name(candidate) {
                Some(player) => {
                    tracker.partition_for_player(player).as_ref() == Some(&requester_partition)
                }
                None => true,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PartitionConfig, PartitionDefinition};
    use crate::host::memory::InMemoryHost;
    use crate::isolation::IsolationSettings;
    use crate::layout::PartitionLayout;

    fn layout(commands: bool) -> PartitionLayout {
        PartitionLayout::from_config(&PartitionConfig {
            isolation: IsolationSettings {
                commands,
                ..IsolationSettings::default()
            },
            partitions: vec![
                PartitionDefinition::new("alpha").with_worlds(["alpha_1"]),
                PartitionDefinition::new("beta").with_worlds(["beta_1"]),
            ],
        })
        .unwrap()
    }

    fn candidates() -> Vec<String> {
        ["Ally", "Enemy", "Wanderer", "reload"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_drops_players_of_other_partitions() {
        let layout = layout(true);
        let host = InMemoryHost::new();
        let me = host.connect("Me", "alpha_1");
        host.connect("Ally", "alpha_1");
        host.connect("Enemy", "beta_1");
        host.connect("Wanderer", "lobby");
        let tracker = MembershipTracker::new(&layout, &host);

        let filtered = CompletionEnforcer::filter_completions(&tracker, me, candidates());
        assert_eq!(filtered, vec!["Ally".to_string(), "reload".to_string()]);
    }

    #[test]
    fn test_toggle_off_or_unresolved_requester_passes_through() {
        let host = InMemoryHost::new();
        let me = host.connect("Me", "alpha_1");
        let lost = host.connect("Lost", "lobby");
        host.connect("Enemy", "beta_1");

        let off = layout(false);
        let tracker = MembershipTracker::new(&off, &host);
        assert_eq!(CompletionEnforcer::filter_completions(&tracker, me, candidates()).len(), 4);

        let on = layout(true);
        let tracker = MembershipTracker::new(&on, &host);
        assert_eq!(CompletionEnforcer::filter_completions(&tracker, lost, candidates()).len(), 4);
    }
}
