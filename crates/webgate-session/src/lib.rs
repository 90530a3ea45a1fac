//! Bounded TTL store with tombstones and eviction handlers.
//!
//! This crate provides the keyed storage underneath the web session cache:
//! - Per-entry TTL, checked lazily on access and eagerly by [`TtlStore::purge_expired`]
//! - LRU capacity bound so the store never grows without limit
//! - Tombstones that mark a key as "just invalidated" for a short while
//! - Insert-if-vacant arbitration: exactly one of several racing inserts wins
//! - An [`EvictionHandler`] that receives every value the store drops on its own
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use webgate_session::{Entry, StoreConfig, TtlStore};
//!
//! let store: TtlStore<u32> = TtlStore::new(StoreConfig::new().with_max_entries(16));
//! store.try_insert("5:alice:abc", 7, Duration::from_secs(60)).unwrap();
//! assert!(matches!(store.entry("5:alice:abc"), Entry::Live(7)));
//! ```

mod config;
mod entry;
mod error;
mod eviction;
mod store;

pub use config::{DEFAULT_MAX_ENTRIES, DEFAULT_TOMBSTONE_TTL, StoreConfig};
pub use entry::{Deadline, Entry};
pub use error::{Error, Result};
pub use eviction::{EvictionHandler, EvictionReason, NoopHandler};
pub use store::{Occupied, StoreStats, TtlStore};
