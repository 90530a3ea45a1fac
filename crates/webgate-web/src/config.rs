//! Web session layer configuration.
//!
//! Loaded from TOML:
//!
//! ```toml
//! auth_servers = ["auth.example.com:3025"]
//! secure_cookies = true
//!
//! [session]
//! max_entries = 1024
//! session_ttl_secs = 600
//! tombstone_ttl_secs = 1
//! cleanup_interval_secs = 60
//! enable_cleanup_task = true
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use webgate_session::StoreConfig;

use crate::error::{Result, WebError};

/// Default maximum number of cached session contexts.
pub const DEFAULT_MAX_ENTRIES: usize = webgate_session::DEFAULT_MAX_ENTRIES;

/// Default lifetime of a cached session context (10 minutes).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(600);

/// Default lifetime of the tombstone left by an invalidation.
pub const DEFAULT_TOMBSTONE_TTL: Duration = webgate_session::DEFAULT_TOMBSTONE_TTL;

/// Default interval between background cleanup passes.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Web session layer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Authentication servers. The first one is dialled.
    pub auth_servers: Vec<String>,

    /// Set the `Secure` attribute on the session cookie.
    pub secure_cookies: bool,

    /// Session cache settings.
    pub session: SessionSettings,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            auth_servers: Vec::new(),
            secure_cookies: true,
            session: SessionSettings::default(),
        }
    }
}

/// Session cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Maximum number of cached contexts and tombstones.
    pub max_entries: usize,

    /// How long a validated context stays cached.
    #[serde(rename = "session_ttl_secs", with = "duration_secs")]
    pub session_ttl: Duration,

    /// How long an invalidated key stays tombstoned.
    ///
    /// A validator whose session lookup started before the invalidation
    /// reached the authentication service may still read the old session
    /// and cache it again once this window has passed.
    #[serde(rename = "tombstone_ttl_secs", with = "duration_secs")]
    pub tombstone_ttl: Duration,

    /// Interval of the background cleanup task.
    #[serde(rename = "cleanup_interval_secs", with = "duration_secs")]
    pub cleanup_interval: Duration,

    /// Whether [`SessionCache::start`](crate::SessionCache::start) spawns the cleanup task.
    pub enable_cleanup_task: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            session_ttl: DEFAULT_SESSION_TTL,
            tombstone_ttl: DEFAULT_TOMBSTONE_TTL,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            enable_cleanup_task: true,
        }
    }
}

impl WebConfig {
    /// Configuration dialling a single authentication server.
    pub fn new(auth_server: impl Into<String>) -> Self {
        Self {
            auth_servers: vec![auth_server.into()],
            ..Self::default()
        }
    }

    /// Set whether cookies carry `Secure`.
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    /// Set the cache capacity.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.session.max_entries = max;
        self
    }

    /// Set how long a validated context stays cached.
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session.session_ttl = ttl;
        self
    }

    /// Set how long an invalidated key stays tombstoned.
    pub fn with_tombstone_ttl(mut self, ttl: Duration) -> Self {
        self.session.tombstone_ttl = ttl;
        self
    }

    /// Set the cleanup task interval.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.session.cleanup_interval = interval;
        self
    }

    /// Enable or disable the cleanup task.
    pub fn with_cleanup_task(mut self, enabled: bool) -> Self {
        self.session.enable_cleanup_task = enabled;
        self
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| WebError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| WebError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    /// Reject configurations the session cache cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.auth_servers.is_empty() {
            return Err(WebError::Config("at least one auth server is required".into()));
        }
        if self.session.session_ttl.is_zero() {
            return Err(WebError::Config("session_ttl_secs must be positive".into()));
        }
        if self.session.enable_cleanup_task && self.session.cleanup_interval.is_zero() {
            return Err(WebError::Config("cleanup_interval_secs must be positive".into()));
        }
        self.store_config().validate()?;
        Ok(())
    }

    /// Settings for the underlying TTL store.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new()
            .with_max_entries(self.session.max_entries)
            .with_tombstone_ttl(self.session.tombstone_ttl)
    }
}

/// Durations written as (possibly fractional) seconds.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = WebConfig::default();
        assert!(config.secure_cookies);
        assert_eq!(config.session.max_entries, 1024);
        assert_eq!(config.session.session_ttl, Duration::from_secs(600));
        assert_eq!(config.session.tombstone_ttl, Duration::from_secs(1));
        // No auth server configured yet.
        assert!(config.validate().is_err());
        assert!(WebConfig::new("auth:3025").validate().is_ok());
    }

    #[test]
    fn test_from_toml_str() {
        let config = WebConfig::from_toml_str(
            r#"
            auth_servers = ["auth-1:3025", "auth-2:3025"]
            secure_cookies = false

            [session]
            max_entries = 64
            session_ttl_secs = 120
            tombstone_ttl_secs = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.auth_servers, vec!["auth-1:3025", "auth-2:3025"]);
        assert!(!config.secure_cookies);
        assert_eq!(config.session.max_entries, 64);
        assert_eq!(config.session.session_ttl, Duration::from_secs(120));
        assert_eq!(config.session.tombstone_ttl, Duration::from_millis(500));
        assert_eq!(config.session.cleanup_interval, DEFAULT_CLEANUP_INTERVAL);
        assert!(config.session.enable_cleanup_task);
    }

    #[test]
    fn test_validation_errors() {
        assert!(matches!(
            WebConfig::from_toml_str("secure_cookies = true"),
            Err(WebError::Config(_))
        ));
        assert!(WebConfig::new("auth:3025").with_max_entries(0).validate().is_err());
        assert!(
            WebConfig::new("auth:3025")
                .with_session_ttl(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(
            WebConfig::new("auth:3025")
                .with_tombstone_ttl(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(matches!(
            WebConfig::from_toml_str("auth_servers = [\"a\"]\n[session]\nsession_ttl_secs = -1"),
            Err(WebError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "auth_servers = [\"auth:3025\"]").unwrap();

        let config = WebConfig::load(file.path()).unwrap();
        assert_eq!(config.auth_servers, vec!["auth:3025"]);

        assert!(WebConfig::load("/nonexistent/webgate.toml").is_err());
    }

    #[test]
    fn test_toml_roundtrip_keeps_durations() {
        let config = WebConfig::new("auth:3025").with_session_ttl(Duration::from_millis(2500));
        let rendered = toml::to_string(&config).unwrap();
        assert!(rendered.contains("session_ttl_secs = 2.5"));
        assert_eq!(WebConfig::from_toml_str(&rendered).unwrap(), config);
    }
}
