//! # Visibility Engine
//!
//! Maintains the symmetric show/hide relation between connected players.
//!
//! Ground truth is always recomputed: two players see each other when they
//! are in the same partition, when either one is unresolved (unmapped world),
//! or when player hiding is switched off. The per-viewer hidden set is only a
//! cache of what has already been applied to the host, so that the expensive
//! show/hide primitive is called only when the desired state differs.
//!
//! ## Cost
//!
//! * [`VisibilityEngine::update_player`] - O(N), used for every membership event
//! * [`VisibilityEngine::reconcile_partition`] - O(M·N) for a partition of M players
//! * [`VisibilityEngine::reconcile_all`] - O(N²), reserved for explicit or
//!   periodic reconciliation
//!
//! ## Failure handling
//!
//! A failing primitive (stale or disconnected entity) is logged and skipped
//! for that pair only. The cache is left untouched so the next pass retries.

use crate::host::VisibilityPrimitive;
use crate::membership::MembershipTracker;
use crate::types::{PartitionId, PlayerId};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, instrument, warn};

/// Counters for one visibility pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisibilityReport {
    /// Primitive show calls that succeeded
    pub shown: usize,
    /// Primitive hide calls that succeeded
    pub hidden: usize,
    /// Primitive calls that failed and were skipped
    pub failures: usize,
}

impl VisibilityReport {
    pub fn merge(&mut self, other: VisibilityReport) {
        self.shown += other.shown;
        self.hidden += other.hidden;
        self.failures += other.failures;
    }

    /// Number of primitive calls attempted.
    pub fn calls(&self) -> usize {
        self.shown + self.hidden + self.failures
    }
}

type Population = Vec<(PlayerId, Option<PartitionId>)>;

#[derive(Debug, Default)]
pub struct VisibilityEngine {
    /// viewer -> players currently hidden from that viewer
    hidden: HashMap<PlayerId, HashSet<PlayerId>>,
}

impl VisibilityEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Desired visibility between two players under the current layout.
    pub fn should_see(tracker: &MembershipTracker<'_>, a: PlayerId, b: PlayerId) -> bool {
        if !tracker.layout().isolation.hides_players() {
            return true;
        }
        Self::desired(
            &tracker.partition_for_player(a),
            &tracker.partition_for_player(b),
            true,
        )
    }

    fn desired(a: &Option<PartitionId>, b: &Option<PartitionId>, hiding: bool) -> bool {
        if !hiding {
            return true;
        }
        match (a, b) {
            (Some(pa), Some(pb)) => pa == pb,
            _ => true,
        }
    }

    fn population(tracker: &MembershipTracker<'_>) -> Population {
        tracker
            .directory()
            .online_players()
            .into_iter()
            .map(|player| (player, tracker.partition_for_player(player)))
            .collect()
    }

    /// Starts tracking a newly connected viewer. A fresh client sees everyone.
    pub fn track_player(&mut self, player: PlayerId) {
        self.hidden.entry(player).or_default();
    }

    /// Recomputes visibility between `player` and every other online player,
    /// in both directions.
    pub fn update_player(
        &mut self,
        tracker: &MembershipTracker<'_>,
        primitive: &dyn VisibilityPrimitive,
        player: PlayerId,
    ) -> VisibilityReport {
        let population = Self::population(tracker);
        let hiding = tracker.layout().isolation.hides_players();
        let player_partition = tracker.partition_for_player(player);

        self.track_player(player);
        let report = self.update_against(primitive, player, &player_partition, &population, hiding);
        debug!(
            %player,
            partition = ?player_partition,
            shown = report.shown,
            hidden = report.hidden,
            failures = report.failures,
            "Visibility updated"
        );
        report
    }

    fn update_against(
        &mut self,
        primitive: &dyn VisibilityPrimitive,
        player: PlayerId,
        player_partition: &Option<PartitionId>,
        population: &Population,
        hiding: bool,
    ) -> VisibilityReport {
        let mut report = VisibilityReport::default();
        for (other, other_partition) in population {
            if *other == player {
                continue;
            }
            let visible = Self::desired(player_partition, other_partition, hiding);
            self.set_visible(primitive, player, *other, visible, &mut report);
            self.set_visible(primitive, *other, player, visible, &mut report);
        }
        report
    }

    /// Forgets a disconnected player in both directions. No primitive is
    /// called: the entity is gone.
    pub fn remove_player(&mut self, player: PlayerId) {
        self.hidden.remove(&player);
        for hidden in self.hidden.values_mut() {
            hidden.remove(&player);
        }
    }

    /// Re-runs the update for every member of one partition.
    #[instrument(skip(self, tracker, primitive))]
    pub fn reconcile_partition(
        &mut self,
        tracker: &MembershipTracker<'_>,
        primitive: &dyn VisibilityPrimitive,
        partition: &PartitionId,
    ) -> VisibilityReport {
        let population = Self::population(tracker);
        let hiding = tracker.layout().isolation.hides_players();
        let members: Vec<(PlayerId, Option<PartitionId>)> = population
            .iter()
            .filter(|(_, p)| p.as_ref() == Some(partition))
            .cloned()
            .collect();

        let mut report = VisibilityReport::default();
        for (member, member_partition) in &members {
            self.track_player(*member);
            report.merge(self.update_against(primitive, *member, member_partition, &population, hiding));
        }
        debug!(
            members = members.len(),
            calls = report.calls(),
            "Partition visibility reconciled"
        );
        report
    }

    /// Full O(N²) sweep over every pair of online players.
    #[instrument(skip_all)]
    pub fn reconcile_all(
        &mut self,
        tracker: &MembershipTracker<'_>,
        primitive: &dyn VisibilityPrimitive,
    ) -> VisibilityReport {
        let population = Self::population(tracker);
        let hiding = tracker.layout().isolation.hides_players();

        // Drop cache entries of players that went away without an event
        let online: HashSet<PlayerId> = population.iter().map(|(p, _)| *p).collect();
        let stale: Vec<PlayerId> = self
            .hidden
            .keys()
            .filter(|p| !online.contains(p))
            .copied()
            .collect();
        for player in stale {
            self.remove_player(player);
        }

        let mut report = VisibilityReport::default();
        for (i, (a, pa)) in population.iter().enumerate() {
            self.track_player(*a);
            for (b, pb) in &population[i + 1..] {
                let visible = Self::desired(pa, pb, hiding);
                self.set_visible(primitive, *a, *b, visible, &mut report);
                self.set_visible(primitive, *b, *a, visible, &mut report);
            }
        }
        debug!(
            players = population.len(),
            calls = report.calls(),
            "Full visibility sweep complete"
        );
        report
    }

    /// Shows every pair the cache still holds hidden, then forgets all
    /// viewers. Used on shutdown so no client is left with ghosts.
    pub fn reveal_all(&mut self, primitive: &dyn VisibilityPrimitive) -> VisibilityReport {
        let mut report = VisibilityReport::default();
        let pairs: Vec<(PlayerId, PlayerId)> = self
            .hidden
            .iter()
            .flat_map(|(viewer, targets)| targets.iter().map(move |t| (*viewer, *t)))
            .collect();
        for (viewer, target) in pairs {
            self.set_visible(primitive, viewer, target, true, &mut report);
        }
        self.hidden.clear();
        report
    }

    fn set_visible(
        &mut self,
        primitive: &dyn VisibilityPrimitive,
        viewer: PlayerId,
        target: PlayerId,
        visible: bool,
        report: &mut VisibilityReport,
    ) {
        let hidden = self.hidden.entry(viewer).or_default();
        if hidden.contains(&target) != visible {
            // Cache already reflects the desired state
            return;
        }

        let result = if visible {
            primitive.show_player(viewer, target)
        } else {
            primitive.hide_player(viewer, target)
        };

        match result {
            Ok(()) if visible => {
                hidden.remove(&target);
                report.shown += 1;
            }
            Ok(()) => {
                hidden.insert(target);
                report.hidden += 1;
            }
            Err(e) => {
                warn!(%viewer, %target, visible, "Visibility primitive failed, skipping pair: {}", e);
                report.failures += 1;
            }
        }
    }

    pub fn is_hidden(&self, viewer: PlayerId, target: PlayerId) -> bool {
        self.hidden
            .get(&viewer)
            .is_some_and(|hidden| hidden.contains(&target))
    }

    /// Players currently hidden from a viewer, sorted.
    pub fn hidden_from(&self, viewer: PlayerId) -> Vec<PlayerId> {
        let mut hidden: Vec<PlayerId> = self
            .hidden
            .get(&viewer)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        hidden.sort();
        hidden
    }

    pub fn hidden_pair_count(&self) -> usize {
        self.hidden.values().map(HashSet::len).sum()
    }

    pub fn tracked_players(&self) -> usize {
        self.hidden.len()
    }

    /// Snapshot of every hidden (viewer, target) pair, ordered.
    pub fn hidden_pairs(&self) -> BTreeSet<(PlayerId, PlayerId)> {
        self.hidden
            .iter()
            .flat_map(|(viewer, targets)| targets.iter().map(move |t| (*viewer, *t)))
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

    fn layout(isolation: IsolationSettings) -> PartitionLayout {
        PartitionLayout::from_config(&PartitionConfig {
            isolation,
            partitions: vec![
                PartitionDefinition::new("alpha").with_worlds(["alpha_1"]),
                PartitionDefinition::new("beta").with_worlds(["beta_1"]),
            ],
        })
        .unwrap()
    }

    #[test]
    fn test_update_hides_other_partitions_mutually() {
        let layout = layout(IsolationSettings::default());
        let host = InMemoryHost::new();
        let x = host.connect("x", "alpha_1");
        let ally = host.connect("ally", "alpha_1");
        let y = host.connect("y", "beta_1");
        let tracker = MembershipTracker::new(&layout, &host);
        let mut engine = VisibilityEngine::new();

        let report = engine.update_player(&tracker, &host, x);
        assert_eq!(report.hidden, 2);
        assert_eq!(report.shown, 0);
        assert!(engine.is_hidden(x, y) && engine.is_hidden(y, x));
        assert!(!engine.is_hidden(x, ally));
        assert!(!host.can_see(x, y) && !host.can_see(y, x));
        assert!(host.can_see(x, ally));
    }

    #[test]
    fn test_redundant_updates_call_nothing() {
        let layout = layout(IsolationSettings::default());
        let host = InMemoryHost::new();
        let x = host.connect("x", "alpha_1");
        host.connect("y", "beta_1");
        let tracker = MembershipTracker::new(&layout, &host);
        let mut engine = VisibilityEngine::new();

        engine.update_player(&tracker, &host, x);
        host.clear_calls();
        let report = engine.update_player(&tracker, &host, x);
        assert_eq!(report.calls(), 0);
        assert_eq!(host.visibility_call_count(), 0);
    }

    #[test]
    fn test_unresolved_player_sees_everyone() {
        let layout = layout(IsolationSettings::default());
        let host = InMemoryHost::new();
        let x = host.connect("x", "alpha_1");
        let y = host.connect("y", "beta_1");
        let lobby = host.connect("l", "lobby");
        let tracker = MembershipTracker::new(&layout, &host);
        let mut engine = VisibilityEngine::new();

        engine.reconcile_all(&tracker, &host);
        assert!(VisibilityEngine::should_see(&tracker, lobby, x));
        assert!(host.can_see(lobby, x) && host.can_see(x, lobby));
        assert!(host.can_see(lobby, y) && host.can_see(y, lobby));
        assert!(!host.can_see(x, y));
    }

    #[test]
    fn test_hiding_disabled_reveals_everyone() {
        let host = InMemoryHost::new();
        let x = host.connect("x", "alpha_1");
        let y = host.connect("y", "beta_1");
        let mut engine = VisibilityEngine::new();

        let strict = layout(IsolationSettings::default());
        engine.reconcile_all(&MembershipTracker::new(&strict, &host), &host);
        assert!(!host.can_see(x, y));

        let open = layout(IsolationSettings::disabled());
        let report = engine.reconcile_all(&MembershipTracker::new(&open, &host), &host);
        assert_eq!(report.shown, 2);
        assert!(host.can_see(x, y) && host.can_see(y, x));
        assert_eq!(engine.hidden_pair_count(), 0);
    }

    #[test]
    fn test_failing_pair_does_not_abort_batch() {
        let layout = layout(IsolationSettings::default());
        let host = InMemoryHost::new();
        let x = host.connect("x", "alpha_1");
        let broken = host.connect("broken", "beta_1");
        let y = host.connect("y", "beta_1");
        host.break_player(broken);
        let tracker = MembershipTracker::new(&layout, &host);
        let mut engine = VisibilityEngine::new();

        let report = engine.update_player(&tracker, &host, x);
        assert_eq!(report.failures, 2);
        assert_eq!(report.hidden, 2);
        assert!(!host.can_see(x, y));
        assert!(!engine.is_hidden(x, broken));

        // The failed pair is retried on the next pass
        host.heal_player(broken);
        let report = engine.update_player(&tracker, &host, x);
        assert_eq!(report.hidden, 2);
        assert!(engine.is_hidden(x, broken) && engine.is_hidden(broken, x));
    }

    #[test]
    fn test_remove_player_clears_both_directions() {
        let layout = layout(IsolationSettings::default());
        let host = InMemoryHost::new();
        let x = host.connect("x", "alpha_1");
        let y = host.connect("y", "beta_1");
        let tracker = MembershipTracker::new(&layout, &host);
        let mut engine = VisibilityEngine::new();

        engine.update_player(&tracker, &host, x);
        engine.remove_player(y);
        assert!(!engine.is_hidden(x, y));
        assert_eq!(engine.tracked_players(), 1);
        assert!(engine.hidden_from(x).is_empty());
    }

    #[test]
    fn test_reconcile_partition_only_touches_members() {
        let layout = layout(IsolationSettings::default());
        let host = InMemoryHost::new();
        let a1 = host.connect("a1", "alpha_1");
        let b1 = host.connect("b1", "beta_1");
        let lobby = host.connect("l", "lobby");
        let tracker = MembershipTracker::new(&layout, &host);
        let mut engine = VisibilityEngine::new();

        let report = engine.reconcile_partition(&tracker, &host, &PartitionId::from("alpha"));
        assert_eq!(report.hidden, 2);
        assert!(engine.is_hidden(a1, b1));
        assert!(!engine.is_hidden(lobby, a1));
    }

    #[test]
    fn test_reveal_all_shows_hidden_pairs() {
        let layout = layout(IsolationSettings::default());
        let host = InMemoryHost::new();
        let x = host.connect("x", "alpha_1");
        let y = host.connect("y", "beta_1");
        let tracker = MembershipTracker::new(&layout, &host);
        let mut engine = VisibilityEngine::new();

        engine.reconcile_all(&tracker, &host);
        assert_eq!(engine.hidden_pairs().len(), 2);

        let report = engine.reveal_all(&host);
        assert_eq!(report.shown, 2);
        assert!(host.can_see(x, y) && host.can_see(y, x));
        assert_eq!(engine.tracked_players(), 0);
    }
}
