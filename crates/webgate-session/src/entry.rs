//! Entry states and expiry deadlines.

use std::time::{Duration, Instant};

/// What a lookup observed for a key.
///
/// `Empty` is never stored: it is reported for keys that are absent or whose
/// TTL has lapsed. `Tombstoned` marks a key that was invalidated moments ago;
/// it never counts as a hit, but a new insert is allowed to replace it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry<V> {
    Empty,
    Tombstoned,
    Live(V),
}

impl<V> Entry<V> {
    /// The live value, if any.
    pub fn live(self) -> Option<V> {
        match self {
            Entry::Live(value) => Some(value),
            Entry::Empty | Entry::Tombstoned => None,
        }
    }

    /// Check if the entry holds a live value.
    pub fn is_live(&self) -> bool {
        matches!(self, Entry::Live(_))
    }

    /// Check if the entry is a tombstone.
    pub fn is_tombstoned(&self) -> bool {
        matches!(self, Entry::Tombstoned)
    }

    /// True when an insert for this key would be accepted.
    pub fn is_vacant(&self) -> bool {
        !self.is_live()
    }
}

/// The point in time after which an entry is expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(Instant);

impl Deadline {
    /// A deadline `ttl` from now.
    pub fn after(ttl: Duration) -> Self {
        Self(Instant::now() + ttl)
    }

    /// Check if the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Check if the deadline has passed at `now`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.0
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }
}

/// What the store keeps per key.
#[derive(Debug)]
pub(crate) enum SlotState<V> {
    Tombstoned,
    Live(V),
}

#[derive(Debug)]
pub(crate) struct Slot<V> {
    pub(crate) state: SlotState<V>,
    pub(crate) deadline: Deadline,
}

impl<V> Slot<V> {
    pub(crate) fn live(value: V, ttl: Duration) -> Self {
        Self {
            state: SlotState::Live(value),
            deadline: Deadline::after(ttl),
        }
    }

    pub(crate) fn tombstone(ttl: Duration) -> Self {
        Self {
            state: SlotState::Tombstoned,
            deadline: Deadline::after(ttl),
        }
    }

    /// Take the live value out of the slot, if it has one.
    pub(crate) fn into_live(self) -> Option<V> {
        match self.state {
            SlotState::Live(value) => Some(value),
            SlotState::Tombstoned => None,
        }
    }
}

impl<V: Clone> Slot<V> {
    pub(crate) fn observe(&self, now: Instant) -> Entry<V> {
        if self.deadline.is_expired_at(now) {
            return Entry::Empty;
        }
        match &self.state {
            SlotState::Tombstoned => Entry::Tombstoned,
            SlotState::Live(value) => Entry::Live(value.clone()),
        }
    }
}
