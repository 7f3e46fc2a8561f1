//! Per-connection subscription manager.
//!
//! Tracks which room topics a WebSocket client is subscribed to and
//! provides server-side event filtering.

use std::collections::HashSet;

use crate::domain::RoomId;

/// Manages the set of room subscriptions for a single WebSocket
/// connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed room IDs. If `subscribe_all` is true, this set is
    /// ignored.
    room_ids: HashSet<RoomId>,
    /// Whether the client subscribes to all rooms (wildcard `"*"`).
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds room IDs to the subscription set. `wildcard` enables the
    /// match-all mode.
    pub fn subscribe(&mut self, ids: &[RoomId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = true;
        }
        for id in ids {
            self.room_ids.insert(*id);
        }
    }

    /// Removes room IDs from the subscription set.
    pub fn unsubscribe(&mut self, ids: &[RoomId]) {
        for id in ids {
            self.room_ids.remove(id);
        }
    }

    /// Returns `true` if the given room ID matches the subscription
    /// filter.
    #[must_use]
    pub fn matches(&self, room_id: RoomId) -> bool {
        self.subscribe_all || self.room_ids.contains(&room_id)
    }

    /// Returns the number of explicitly subscribed room IDs.
    #[must_use]
    pub fn count(&self) -> usize {
        self.room_ids.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn empty_matches_nothing() {
        let mgr = SubscriptionManager::new();
        assert!(!mgr.matches(RoomId::new()));
    }

    #[test]
    fn subscribe_specific_room() {
        let mut mgr = SubscriptionManager::new();
        let id = RoomId::new();
        mgr.subscribe(&[id], false);
        assert!(mgr.matches(id));
        assert!(!mgr.matches(RoomId::new()));
    }

    #[test]
    fn wildcard_matches_everything() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[], true);
        assert!(mgr.matches(RoomId::new()));
        assert!(mgr.matches(RoomId::new()));
    }

    #[test]
    fn unsubscribe_removes_room() {
        let mut mgr = SubscriptionManager::new();
        let id = RoomId::new();
        mgr.subscribe(&[id], false);
        assert!(mgr.matches(id));
        mgr.unsubscribe(&[id]);
        assert!(!mgr.matches(id));
    }

    #[test]
    fn count_tracks_explicit() {
        let mut mgr = SubscriptionManager::new();
        assert_eq!(mgr.count(), 0);
        mgr.subscribe(&[RoomId::new(), RoomId::new()], false);
        assert_eq!(mgr.count(), 2);
    }
}
