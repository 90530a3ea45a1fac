//! Bounded TTL store with tombstones and insert-if-vacant arbitration.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::StoreConfig;
use crate::entry::{Entry, Slot, SlotState};
use crate::error::{Error, Result};
use crate::eviction::{EvictionHandler, EvictionReason, NoopHandler};

/// Values pulled out under the lock, handed to the handler after unlocking.
type Evicted<V> = Vec<(String, V, EvictionReason)>;

/// Returned by [`TtlStore::try_insert`] when a live value already holds the key.
///
/// The rejected value is handed back so the caller can dispose of whatever
/// it owns; the store never keeps it.
#[derive(Debug)]
pub struct Occupied<V> {
    /// Key the insert targeted.
    pub key: String,

    /// The value that won the race and stays cached.
    pub existing: V,

    /// The value that was not inserted.
    pub rejected: V,
}

impl<V> From<Occupied<V>> for Error {
    fn from(occupied: Occupied<V>) -> Self {
        Error::AlreadyExists(occupied.key)
    }
}

/// Keyed store of values with per-entry TTL.
///
/// All state sits behind one mutex that is held only while the map is read
/// or written. The [`EvictionHandler`] runs after the mutex is released.
/// Cloning is cheap and clones share the same entries.
pub struct TtlStore<V, H = NoopHandler> {
    inner: Arc<Mutex<LruCache<String, Slot<V>>>>,
    handler: Arc<H>,
    config: StoreConfig,
}

impl<V> TtlStore<V, NoopHandler>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a store that silently drops evicted values.
    pub fn new(config: StoreConfig) -> Self {
        Self::with_eviction_handler(config, NoopHandler)
    }
}

impl<V, H> TtlStore<V, H>
where
    V: Clone + Send + Sync + 'static,
    H: EvictionHandler<V>,
{
    /// Create a store that reports evicted values to `handler`.
    pub fn with_eviction_handler(config: StoreConfig, handler: H) -> Self {
        let cap = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);

        Self {
            inner: Arc::new(Mutex::new(LruCache::new(cap))),
            handler: Arc::new(handler),
            config,
        }
    }

    /// Get the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of stored entries, tombstones and not yet purged expired entries included.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Look up a key.
    ///
    /// Marks the entry as recently used but does not extend its TTL. An
    /// expired entry found here is removed and, if live, evicted.
    pub fn entry(&self, key: &str) -> Entry<V> {
        let now = Instant::now();
        let mut evicted = Vec::new();

        let entry = {
            let mut lru = self.inner.lock();
            match lru.get(key).map(|slot| slot.observe(now)) {
                None => Entry::Empty,
                Some(Entry::Empty) => {
                    if let Some(value) = lru.pop(key).and_then(Slot::into_live) {
                        evicted.push((key.to_string(), value, EvictionReason::Expired));
                    }
                    Entry::Empty
                }
                Some(observed) => observed,
            }
        };

        self.dispatch(evicted);
        entry
    }

    /// Get the live value stored under `key`.
    pub fn get(&self, key: &str) -> Result<V> {
        self.entry(key)
            .live()
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    /// Check for a live value without touching LRU order.
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.inner
            .lock()
            .peek(key)
            .is_some_and(|slot| slot.observe(now).is_live())
    }

    /// Insert `value` unless a live value already holds `key`.
    ///
    /// Absent, expired and tombstoned keys accept the insert. This is the
    /// single serialization point for racing creators: exactly one of them
    /// gets `Ok`, all others get [`Occupied`] carrying the winner.
    pub fn try_insert(
        &self,
        key: &str,
        value: V,
        ttl: Duration,
    ) -> std::result::Result<V, Occupied<V>> {
        let now = Instant::now();
        let mut evicted = Vec::new();

        let outcome = {
            let mut lru = self.inner.lock();
            if let Some(Entry::Live(existing)) = lru.peek(key).map(|slot| slot.observe(now)) {
                Err(Occupied {
                    key: key.to_string(),
                    existing,
                    rejected: value,
                })
            } else {
                let slot = Slot::live(value.clone(), ttl);
                if let Some((old_key, old_slot)) = lru.push(key.to_string(), slot) {
                    let reason = if old_key == key || old_slot.deadline.is_expired_at(now) {
                        EvictionReason::Expired
                    } else {
                        EvictionReason::Capacity
                    };
                    if let Some(old) = old_slot.into_live() {
                        evicted.push((old_key, old, reason));
                    }
                }
                trace!(key = %key, ttl_ms = ttl.as_millis() as u64, size = lru.len(), "Entry inserted");
                Ok(value)
            }
        };

        self.dispatch(evicted);
        outcome
    }

    /// Replace whatever `key` holds with a tombstone.
    ///
    /// The tombstone lives for the configured tombstone TTL. The previous
    /// live value, if any, is returned to the caller rather than evicted.
    pub fn tombstone(&self, key: &str) -> Option<V> {
        let mut evicted = Vec::new();

        let previous = {
            let mut lru = self.inner.lock();
            match lru.push(key.to_string(), Slot::tombstone(self.config.tombstone_ttl)) {
                Some((old_key, old_slot)) if old_key == key => old_slot.into_live(),
                Some((old_key, old_slot)) => {
                    if let Some(old) = old_slot.into_live() {
                        evicted.push((old_key, old, EvictionReason::Capacity));
                    }
                    None
                }
                None => None,
            }
        };

        debug!(key = %key, ttl_ms = self.config.tombstone_ttl.as_millis() as u64, "Entry tombstoned");
        self.dispatch(evicted);
        previous
    }

    /// Remove `key` entirely, returning its live value to the caller.
    pub fn remove(&self, key: &str) -> Option<V> {
        self.inner.lock().pop(key).and_then(Slot::into_live)
    }

    /// Remove every expired entry, evicting the live ones.
    ///
    /// Returns the number of entries removed, tombstones included.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();

        let (removed, evicted) = {
            let mut lru = self.inner.lock();
            let expired: Vec<String> = lru
                .iter()
                .filter(|(_, slot)| slot.deadline.is_expired_at(now))
                .map(|(key, _)| key.clone())
                .collect();

            let mut evicted: Evicted<V> = Vec::new();
            for key in &expired {
                if let Some(value) = lru.pop(key).and_then(Slot::into_live) {
                    evicted.push((key.clone(), value, EvictionReason::Expired));
                }
            }
            (expired.len(), evicted)
        };

        if removed > 0 {
            debug!(removed, evicted = evicted.len(), "Purged expired entries");
        }

        self.dispatch(evicted);
        removed
    }

    /// Remove everything, returning all live values to the caller.
    pub fn drain(&self) -> Vec<(String, V)> {
        let mut lru = self.inner.lock();
        let mut live = Vec::with_capacity(lru.len());
        while let Some((key, slot)) = lru.pop_lru() {
            if let Some(value) = slot.into_live() {
                live.push((key, value));
            }
        }
        live
    }

    /// Get store statistics.
    pub fn stats(&self) -> StoreStats {
        let now = Instant::now();
        let lru = self.inner.lock();

        let mut stats = StoreStats {
            size: lru.len(),
            capacity: self.config.max_entries,
            live: 0,
            tombstones: 0,
            expired: 0,
        };
        for (_, slot) in lru.iter() {
            if slot.deadline.is_expired_at(now) {
                stats.expired += 1;
            } else if matches!(slot.state, SlotState::Tombstoned) {
                stats.tombstones += 1;
            } else {
                stats.live += 1;
            }
        }
        stats
    }

    fn dispatch(&self, evicted: Evicted<V>) {
        for (key, value, reason) in evicted {
            debug!(key = %key, %reason, "Evicting entry");
            self.handler.on_evict(&key, value, reason);
        }
    }
}

impl<V, H> Clone for TtlStore<V, H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            handler: Arc::clone(&self.handler),
            config: self.config.clone(),
        }
    }
}

/// Store statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Stored entries of any kind.
    pub size: usize,

    /// Maximum capacity.
    pub capacity: usize,

    /// Unexpired live values.
    pub live: usize,

    /// Unexpired tombstones.
    pub tombstones: usize,

    /// Entries past their deadline that have not been purged yet.
    pub expired: usize,
}
