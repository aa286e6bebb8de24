//! Per-player partition state store.
//!
//! Keyed by (partition, player). Entries are created lazily on first
//! membership, survive world changes and partition restarts, and are only
//! discarded when the engine shuts down. Nothing here touches disk.

use crate::types::{current_timestamp_millis, PartitionId, PlayerId};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Source of "now" for session accounting, in milliseconds since the epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        current_timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn starting_at(millis: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(millis)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// What the engine remembers about one player in one partition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerPartitionState {
    /// Start of the current (or last) session, ms since the epoch
    pub last_join: u64,
    pub session_open: bool,
    /// Accumulated time of finished sessions; never decreases
    pub active_time: Duration,
    /// Collaborator-owned values
    pub values: HashMap<String, serde_json::Value>,
}

impl PlayerPartitionState {
    /// Accumulated time including the open session, if any.
    pub fn active_time_at(&self, now: u64) -> Duration {
        if self.session_open {
            self.active_time + Duration::from_millis(now.saturating_sub(self.last_join))
        } else {
            self.active_time
        }
    }
}

type StateKey = (PartitionId, PlayerId);

#[derive(Clone)]
pub struct PlayerStateStore {
    states: Arc<DashMap<StateKey, PlayerPartitionState>>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for PlayerStateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerStateStore")
            .field("entries", &self.states.len())
            .finish()
    }
}

impl Default for PlayerStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerStateStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            states: Arc::new(DashMap::new()),
            clock,
        }
    }

    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Opens a session, creating the entry with defaults if needed.
    /// Re-opening an already open session restarts it from now after
    /// banking the elapsed time.
    pub fn begin_session(&self, partition: &PartitionId, player: PlayerId) {
        let now = self.clock.now_millis();
        let mut state = self.states.entry((partition.clone(), player)).or_default();
        if state.session_open {
            let elapsed = Duration::from_millis(now.saturating_sub(state.last_join));
            state.active_time += elapsed;
        }
        state.last_join = now;
        state.session_open = true;
    }

    /// Closes a session and banks its duration. Closing a closed or missing
    /// session does nothing. Returns the accumulated total.
    pub fn end_session(&self, partition: &PartitionId, player: PlayerId) -> Option<Duration> {
        let now = self.clock.now_millis();
        let mut state = self.states.get_mut(&(partition.clone(), player))?;
        if state.session_open {
            let elapsed = Duration::from_millis(now.saturating_sub(state.last_join));
            state.active_time += elapsed;
            state.session_open = false;
        }
        Some(state.active_time)
    }

    /// Banks the elapsed time of an open session and keeps it open from now.
    /// Returns the accumulated total, `None` if there is no entry.
    pub fn flush_session(&self, partition: &PartitionId, player: PlayerId) -> Option<Duration> {
        let now = self.clock.now_millis();
        let mut state = self.states.get_mut(&(partition.clone(), player))?;
        if state.session_open {
            let elapsed = Duration::from_millis(now.saturating_sub(state.last_join));
            state.active_time += elapsed;
            state.last_join = now;
        }
        Some(state.active_time)
    }

    /// Closes every open session of a player, whatever the partition.
    /// Returns the partitions whose session was closed.
    pub fn end_all_sessions(&self, player: PlayerId) -> Vec<PartitionId> {
        let partitions: Vec<PartitionId> = self
            .states
            .iter()
            .filter(|entry| entry.key().1 == player && entry.value().session_open)
            .map(|entry| entry.key().0.clone())
            .collect();
        for partition in &partitions {
            self.end_session(partition, player);
        }
        partitions
    }

    pub fn get(&self, partition: &PartitionId, player: PlayerId) -> Option<PlayerPartitionState> {
        self.states
            .get(&(partition.clone(), player))
            .map(|state| state.clone())
    }

    /// Accumulated active time including any open session.
    pub fn active_time(&self, partition: &PartitionId, player: PlayerId) -> Duration {
        let now = self.clock.now_millis();
        self.states
            .get(&(partition.clone(), player))
            .map(|state| state.active_time_at(now))
            .unwrap_or_default()
    }

    pub fn get_value(&self, partition: &PartitionId, player: PlayerId, key: &str) -> Option<serde_json::Value> {
        self.states
            .get(&(partition.clone(), player))
            .and_then(|state| state.values.get(key).cloned())
    }

    /// Stores a collaborator value, creating the entry if needed. Returns the
    /// previous value.
    pub fn set_value(
        &self,
        partition: &PartitionId,
        player: PlayerId,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Option<serde_json::Value> {
        self.states
            .entry((partition.clone(), player))
            .or_default()
            .values
            .insert(key.into(), value)
    }

    pub fn remove_value(&self, partition: &PartitionId, player: PlayerId, key: &str) -> Option<serde_json::Value> {
        self.states
            .get_mut(&(partition.clone(), player))
            .and_then(|mut state| state.values.remove(key))
    }

    /// Players with an entry for a partition, sorted.
    pub fn players_for_partition(&self, partition: &PartitionId) -> Vec<PlayerId> {
        let mut players: Vec<PlayerId> = self
            .states
            .iter()
            .filter(|entry| &entry.key().0 == partition)
            .map(|entry| entry.key().1)
            .collect();
        players.sort();
        players
    }

    pub fn open_session_count(&self) -> usize {
        self.states.iter().filter(|entry| entry.value().session_open).count()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn clear(&self) {
        self.states.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> (PlayerStateStore, ManualClock) {
        let clock = ManualClock::starting_at(1_000_000);
        (PlayerStateStore::with_clock(Arc::new(clock.clone())), clock)
    }

    #[test]
    fn test_session_accounting() {
        let (store, clock) = store();
        let alpha = PartitionId::from("alpha");
        let player = PlayerId::new();

        store.begin_session(&alpha, player);
        clock.advance(Duration::from_secs(30));
        assert_eq!(store.active_time(&alpha, player), Duration::from_secs(30));

        assert_eq!(store.end_session(&alpha, player), Some(Duration::from_secs(30)));
        clock.advance(Duration::from_secs(100));
        // Closed sessions don't accumulate
        assert_eq!(store.active_time(&alpha, player), Duration::from_secs(30));
        assert_eq!(store.end_session(&alpha, player), Some(Duration::from_secs(30)));

        store.begin_session(&alpha, player);
        clock.advance(Duration::from_secs(5));
        store.end_session(&alpha, player);
        assert_eq!(store.active_time(&alpha, player), Duration::from_secs(35));
    }

    #[test]
    fn test_reopening_banks_elapsed_time() {
        let (store, clock) = store();
        let alpha = PartitionId::from("alpha");
        let player = PlayerId::new();

        store.begin_session(&alpha, player);
        clock.advance(Duration::from_secs(10));
        store.begin_session(&alpha, player);
        clock.advance(Duration::from_secs(10));
        assert_eq!(store.active_time(&alpha, player), Duration::from_secs(20));
    }

    #[test]
    fn test_flush_keeps_session_open() {
        let (store, clock) = store();
        let alpha = PartitionId::from("alpha");
        let player = PlayerId::new();

        store.begin_session(&alpha, player);
        clock.advance(Duration::from_secs(12));
        assert_eq!(store.flush_session(&alpha, player), Some(Duration::from_secs(12)));

        let state = store.get(&alpha, player).unwrap();
        assert!(state.session_open);
        assert_eq!(state.last_join, 1_012_000);
        clock.advance(Duration::from_secs(3));
        assert_eq!(store.active_time(&alpha, player), Duration::from_secs(15));
    }

    #[test]
    fn test_end_missing_session() {
        let (store, _) = store();
        assert_eq!(store.end_session(&PartitionId::from("alpha"), PlayerId::new()), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_end_all_sessions_across_partitions() {
        let (store, clock) = store();
        let alpha = PartitionId::from("alpha");
        let beta = PartitionId::from("beta");
        let player = PlayerId::new();

        store.begin_session(&alpha, player);
        store.begin_session(&beta, player);
        clock.advance(Duration::from_secs(3));
        let mut closed = store.end_all_sessions(player);
        closed.sort();

        assert_eq!(closed, vec![alpha.clone(), beta.clone()]);
        assert_eq!(store.open_session_count(), 0);
        assert_eq!(store.active_time(&alpha, player), Duration::from_secs(3));
        assert_eq!(store.active_time(&beta, player), Duration::from_secs(3));
    }

    #[test]
    fn test_value_bag() {
        let (store, _) = store();
        let alpha = PartitionId::from("alpha");
        let player = PlayerId::new();

        assert_eq!(store.set_value(&alpha, player, "kills", json!(3)), None);
        assert_eq!(store.set_value(&alpha, player, "kills", json!(4)), Some(json!(3)));
        assert_eq!(store.get_value(&alpha, player, "kills"), Some(json!(4)));
        assert_eq!(store.get_value(&PartitionId::from("beta"), player, "kills"), None);
        assert_eq!(store.remove_value(&alpha, player, "kills"), Some(json!(4)));
        assert_eq!(store.players_for_partition(&alpha), vec![player]);

        // Values don't open a session
        assert!(!store.get(&alpha, player).unwrap().session_open);
    }
}
