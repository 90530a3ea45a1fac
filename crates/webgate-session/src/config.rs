//! Configuration for the TTL store.

use std::time::Duration;

use crate::error::{Error, Result};

/// Default maximum number of entries (live values and tombstones together).
pub const DEFAULT_MAX_ENTRIES: usize = 1024;

/// Default lifetime of the tombstone left behind by an invalidation.
pub const DEFAULT_TOMBSTONE_TTL: Duration = Duration::from_secs(1);

/// Configuration for the TTL store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of entries before the least recently used one is pushed out.
    pub max_entries: usize,

    /// How long the tombstone left behind by an invalidation shadows its key.
    pub tombstone_ttl: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            tombstone_ttl: DEFAULT_TOMBSTONE_TTL,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of entries.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Set the tombstone TTL.
    pub fn with_tombstone_ttl(mut self, ttl: Duration) -> Self {
        self.tombstone_ttl = ttl;
        self
    }

    /// Reject configurations the store cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(Error::InvalidConfig("max_entries must be at least 1".into()));
        }
        if self.tombstone_ttl.is_zero() {
            return Err(Error::InvalidConfig("tombstone_ttl must be non-zero".into()));
        }
        Ok(())
    }
}
