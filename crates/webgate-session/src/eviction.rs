//! Eviction hooks.
//!
//! The store owns its values until it drops them. Whenever it drops a live
//! value on its own initiative (TTL lapse or capacity pressure) the value is
//! handed to the [`EvictionHandler`], so resources it owns can be released.
//! Values removed through [`TtlStore::tombstone`](crate::TtlStore::tombstone),
//! [`TtlStore::remove`](crate::TtlStore::remove) or
//! [`TtlStore::drain`](crate::TtlStore::drain) go back to the caller instead.
//!
//! Handlers are always invoked after the store lock has been released, so a
//! handler may call back into the store.

use std::fmt;

/// Why the store dropped a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// The entry's TTL lapsed.
    Expired,
    /// The store was full and the entry was the least recently used.
    Capacity,
}

impl fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionReason::Expired => write!(f, "expired"),
            EvictionReason::Capacity => write!(f, "capacity"),
        }
    }
}

/// Receives values the store evicts.
pub trait EvictionHandler<V>: Send + Sync {
    /// Called once per evicted live value. Tombstones are never reported.
    fn on_evict(&self, key: &str, value: V, reason: EvictionReason);
}

impl<V, F> EvictionHandler<V> for F
where
    F: Fn(&str, V, EvictionReason) + Send + Sync,
{
    fn on_evict(&self, key: &str, value: V, reason: EvictionReason) {
        self(key, value, reason)
    }
}

/// Handler that simply drops evicted values.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

impl<V> EvictionHandler<V> for NoopHandler {
    fn on_evict(&self, _key: &str, _value: V, _reason: EvictionReason) {}
}
