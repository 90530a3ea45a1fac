//! Web session cache.
//!
//! Holds one [`SessionContext`] per (user, session id) so requests carrying
//! the same session cookie reuse a single connection to the authentication
//! service instead of reconnecting on every page hit.
//!
//! # Concurrency
//!
//! The only shared mutable state is the TTL store, guarded by one mutex that
//! is never held across a network call. Several requests may miss on the
//! same key at once; each opens its own connection, and the store's
//! insert-if-vacant step picks exactly one winner. Losers close their own
//! connection and hand back the winner's context.
//!
//! Contexts leave the cache in one of three ways, and each closes the
//! connection exactly once:
//! - [`SessionCache::invalidate`] tombstones the key and closes the context
//! - TTL expiry or capacity pressure hands the context to [`CloseOnEvict`]
//! - [`SessionCache::shutdown`] drains the cache and closes everything

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use axum::http::HeaderMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};
use webgate_auth::{
    AuthClient, AuthError, CertAuthority, CertAuthorityKind, Connector, Credentials, InviteInfo,
    SharedClient, WebSession,
};
use webgate_session::{
    Entry, EvictionHandler, EvictionReason, Occupied, StoreStats, TtlStore,
};

use crate::config::WebConfig;
use crate::context::{SessionContext, SessionKey};
use crate::cookie::{CookieCodec, JsonCookieCodec, SESSION_COOKIE_NAME, SessionCookie, find_cookie};
use crate::error::{Result, WebError};

// ─────────────────────────────────────────────────────────────────────────────
// Request / response types
// ─────────────────────────────────────────────────────────────────────────────

/// Request for a short lived SSH user certificate.
#[derive(Clone)]
pub struct CertificateRequest {
    pub user: String,
    pub password: String,
    pub otp_token: String,
    /// Public key to certify, in SSH wire format.
    pub public_key: Vec<u8>,
    /// Requested certificate validity.
    pub ttl: Duration,
}

impl fmt::Debug for CertificateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateRequest")
            .field("user", &self.user)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// A signed user certificate plus the host authorities to trust.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SshLogin {
    pub cert: Vec<u8>,
    pub host_signers: Vec<CertAuthority>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Eviction
// ─────────────────────────────────────────────────────────────────────────────

/// Closes contexts the store evicts on its own.
///
/// Holds no reference to the store, so it can never block on the store's
/// lock.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloseOnEvict;

impl EvictionHandler<Arc<SessionContext>> for CloseOnEvict {
    fn on_evict(&self, _key: &str, ctx: Arc<SessionContext>, reason: EvictionReason) {
        let _enter = ctx.span().enter();
        info!(%reason, "Closing evicted session context");
        if let Err(e) = ctx.close() {
            warn!(error = %e, "Failed to close evicted session context");
        }
    }
}

type ContextStore = TtlStore<Arc<SessionContext>, CloseOnEvict>;

// ─────────────────────────────────────────────────────────────────────────────
// SessionCache
// ─────────────────────────────────────────────────────────────────────────────

struct Inner {
    contexts: ContextStore,
    connector: Arc<dyn Connector>,
    codec: Arc<dyn CookieCodec>,
    config: WebConfig,
    reaper: Mutex<Option<CancellationToken>>,
}

/// Authenticates web users and caches their session contexts.
///
/// Construct one per process and hand clones to request handlers; clones
/// share the same cache.
#[derive(Clone)]
pub struct SessionCache {
    inner: Arc<Inner>,
}

impl SessionCache {
    /// Create a cache using the default cookie codec. No background task is started.
    pub fn new(config: WebConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        Self::with_codec(config, connector, Arc::new(JsonCookieCodec))
    }

    /// Create a cache with a custom cookie codec.
    pub fn with_codec(
        config: WebConfig,
        connector: Arc<dyn Connector>,
        codec: Arc<dyn CookieCodec>,
    ) -> Result<Self> {
        config.validate()?;
        let contexts = TtlStore::with_eviction_handler(config.store_config(), CloseOnEvict);

        Ok(Self {
            inner: Arc::new(Inner {
                contexts,
                connector,
                codec,
                config,
                reaper: Mutex::new(None),
            }),
        })
    }

    /// Create a cache and, if configured, start the background cleanup task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: WebConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        let cache = Self::new(config, connector)?;
        if cache.inner.config.session.enable_cleanup_task {
            cache.spawn_reaper();
        }
        Ok(cache)
    }

    /// Configuration the cache was built with.
    pub fn config(&self) -> &WebConfig {
        &self.inner.config
    }

    /// Number of cached entries, tombstones included.
    pub fn len(&self) -> usize {
        self.inner.contexts.len()
    }

    /// Check if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.contexts.is_empty()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> StoreStats {
        self.inner.contexts.stats()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Uncached operations
    // ─────────────────────────────────────────────────────────────────────

    /// Check a password and one-time code, returning a new web session.
    pub async fn authenticate(
        &self,
        user: &str,
        password: &str,
        otp_token: &str,
    ) -> Result<WebSession> {
        let client = self
            .connect(Credentials::password(user, password, otp_token)?)
            .await?;
        let result = client.sign_in(user, password).await;
        release(&client);
        Ok(result?)
    }

    /// Issue an SSH user certificate and return it with the host authorities.
    pub async fn issue_certificate(&self, req: &CertificateRequest) -> Result<SshLogin> {
        let client = self
            .connect(Credentials::password(&req.user, &req.password, &req.otp_token)?)
            .await?;

        let result = async {
            let cert = client
                .generate_user_cert(&req.public_key, &req.user, req.ttl)
                .await?;
            let host_signers = client.get_cert_authorities(CertAuthorityKind::Host).await?;
            Ok::<_, AuthError>(SshLogin { cert, host_signers })
        }
        .await;

        release(&client);
        Ok(result?)
    }

    /// Read what a signup token was issued for, without redeeming it.
    pub async fn get_invite_info(&self, token: &str) -> Result<InviteInfo> {
        let client = self.connect(Credentials::signup_token(token)?).await?;
        let result = client.get_signup_token_data(token).await;
        release(&client);
        Ok(result?)
    }

    /// Redeem a signup token: create the account and its first web session.
    pub async fn create_user(
        &self,
        token: &str,
        password: &str,
        otp_token: &str,
    ) -> Result<WebSession> {
        let client = self.connect(Credentials::signup_token(token)?).await?;
        let result = client.create_user_with_token(token, password, otp_token).await;
        release(&client);
        Ok(result?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Cached sessions
    // ─────────────────────────────────────────────────────────────────────

    /// Return the context for (user, sid), creating it on a cache miss.
    ///
    /// A hit costs no network call. A miss opens a connection with the
    /// session as credentials and fetches the session once; failures are
    /// returned as they are and nothing is cached.
    pub async fn validate_session(&self, user: &str, sid: &str) -> Result<Arc<SessionContext>> {
        let key = SessionKey::new(user, sid).cache_key();

        if let Entry::Live(ctx) = self.inner.contexts.entry(&key) {
            ctx.span().in_scope(|| debug!("Got session context from cache"));
            return Ok(ctx);
        }

        let client = self.connect(Credentials::web_session(user, sid)?).await?;
        let session = match client.get_web_session_info(user, sid).await {
            Ok(session) => session,
            Err(e) => {
                release(&client);
                return Err(e.into());
            }
        };

        let ctx = Arc::new(SessionContext::new(user, session, client));
        match self
            .inner
            .contexts
            .try_insert(&key, ctx, self.inner.config.session.session_ttl)
        {
            Ok(ctx) => {
                ctx.span().in_scope(|| info!("Session context cached"));
                Ok(ctx)
            }
            Err(Occupied {
                existing, rejected, ..
            }) => {
                // Someone else cached this session first: drop our connection.
                let _enter = rejected.span().enter();
                debug!("Session context just created elsewhere, returning the existing one");
                if let Err(e) = rejected.close() {
                    warn!(error = %e, "Failed to close duplicate session context");
                }
                Ok(existing)
            }
        }
    }

    /// Terminate a session.
    ///
    /// The key is tombstoned first, so a later validation for it creates a
    /// fresh context instead of finding the old one. Then the session is
    /// deleted on the authentication service, over a new connection if the
    /// context's own was already closed. The context is closed even if the
    /// delete fails.
    pub async fn invalidate(&self, ctx: &SessionContext) -> Result<()> {
        let key = ctx.key().cache_key();

        if let Some(previous) = self.inner.contexts.tombstone(&key)
            && !std::ptr::eq(Arc::as_ptr(&previous), ctx)
        {
            // A newer context for the same session was cached; it goes too.
            if let Err(e) = previous.close() {
                warn!(error = %e, "Failed to close replaced session context");
            }
        }

        let result = self
            .delete_remote(ctx)
            .instrument(ctx.span().clone())
            .await;

        if let Err(e) = ctx.close() {
            ctx.span()
                .in_scope(|| warn!(error = %e, "Failed to close invalidated session context"));
        }
        result
    }

    /// Delete the context's session on the authentication service.
    ///
    /// Uses the context's own connection while it is open. Once it has been
    /// closed, by expiry or eviction for instance, a throwaway connection
    /// authenticated with the session itself carries the delete.
    async fn delete_remote(&self, ctx: &SessionContext) -> Result<()> {
        let user = ctx.user();
        let sid = ctx.web_session().id.as_str();

        if let Ok(client) = ctx.client() {
            match client.delete_web_session(user, sid).await {
                Err(AuthError::Closed) => {}
                other => {
                    other?;
                    info!("Session invalidated");
                    return Ok(());
                }
            }
        }

        debug!("Session context already closed, deleting over a new connection");
        let client = self.connect(Credentials::web_session(user, sid)?).await?;
        let deleted = client.delete_web_session(user, sid).await;
        release(&client);
        deleted?;
        info!("Session invalidated");
        Ok(())
    }

    /// Evict every expired context now. Returns the number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        self.inner.contexts.purge_expired()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Start the background cleanup task, unless it is already running.
    ///
    /// The task only holds a weak reference, so it ends on its own once the
    /// last clone of the cache is dropped.
    pub fn spawn_reaper(&self) {
        let mut slot = self.inner.reaper.lock();
        if slot.is_some() {
            return;
        }

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let period = self.inner.config.session.cleanup_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        inner.contexts.purge_expired();
                    }
                }
            }
            debug!("Session cleanup task stopped");
        });

        debug!(interval_ms = period.as_millis() as u64, "Session cleanup task started");
        *slot = Some(token);
    }

    /// Stop the cleanup task and close every cached context.
    ///
    /// Returns the number of contexts closed. The cache stays usable.
    pub fn shutdown(&self) -> usize {
        if let Some(token) = self.inner.reaper.lock().take() {
            token.cancel();
        }

        let drained = self.inner.contexts.drain();
        for (_, ctx) in &drained {
            if let Err(e) = ctx.close() {
                ctx.span()
                    .in_scope(|| warn!(error = %e, "Failed to close session context on shutdown"));
            }
        }
        info!(closed = drained.len(), "Session cache shut down");
        drained.len()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Cookies
    // ─────────────────────────────────────────────────────────────────────

    /// Add a `Set-Cookie` header carrying the session.
    pub fn set_session_cookie(&self, headers: &mut HeaderMap, user: &str, sid: &str) -> Result<()> {
        let value = self.inner.codec.encode(user, sid)?;
        SessionCookie::new(value, self.inner.config.secure_cookies).apply(headers)
    }

    /// Add a `Set-Cookie` header that clears the session cookie.
    pub fn clear_session_cookie(&self, headers: &mut HeaderMap) -> Result<()> {
        SessionCookie::cleared(self.inner.config.secure_cookies).apply(headers)
    }

    /// Decode the (user, session id) pair from a request's session cookie.
    pub fn session_from_headers(&self, headers: &HeaderMap) -> Result<(String, String)> {
        let value = find_cookie(headers, SESSION_COOKIE_NAME)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| WebError::Cookie("no session cookie".into()))?;
        self.inner.codec.decode(value)
    }

    async fn connect(&self, credentials: Credentials) -> Result<SharedClient> {
        let server = self
            .inner
            .config
            .auth_servers
            .first()
            .ok_or_else(|| WebError::Config("no auth servers configured".into()))?;

        debug!(
            server = %server,
            method = credentials.method(),
            login = credentials.login(),
            "Connecting to auth server"
        );
        Ok(self.inner.connector.connect(server, credentials).await?)
    }
}

impl fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCache")
            .field("auth_servers", &self.inner.config.auth_servers)
            .field("entries", &self.inner.contexts.len())
            .finish_non_exhaustive()
    }
}

/// Close a connection opened for a single request.
fn release(client: &SharedClient) {
    if let Err(e) = AuthClient::close(client.as_ref()) {
        warn!(error = %e, "Failed to close auth client");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webgate_auth::{MockAuthService, MockConnector};

    fn cache() -> (SessionCache, Arc<MockAuthService>) {
        let service = MockAuthService::new();
        let connector = Arc::new(MockConnector::new(service.clone()));
        let cache = SessionCache::new(
            WebConfig::new("auth:3025").with_cleanup_task(false),
            connector,
        )
        .unwrap();
        (cache, service)
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let connector = Arc::new(MockConnector::new(MockAuthService::new()));
        let result = SessionCache::new(WebConfig::default(), connector);
        assert!(matches!(result, Err(WebError::Config(_))));
    }

    #[tokio::test]
    async fn test_validate_hit_skips_network() {
        let (cache, service) = cache();
        service.add_session("alice", "abc123");

        let first = cache.validate_session("alice", "abc123").await.unwrap();
        let second = cache.validate_session("alice", "abc123").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(service.session_info_calls(), 1);
        assert_eq!(service.connects(), 1);
    }

    #[tokio::test]
    async fn test_validate_unknown_session_caches_nothing() {
        let (cache, service) = cache();

        let err = cache.validate_session("alice", "nope").await.unwrap_err();

        assert!(matches!(err, WebError::Auth(ref e) if e.is_not_found()));
        assert!(cache.is_empty());
        assert_eq!(service.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_validate_network_failure_propagates() {
        let (cache, service) = cache();
        service.add_session("alice", "abc123");
        service.set_unreachable(true);

        let err = cache.validate_session("alice", "abc123").await.unwrap_err();

        assert!(matches!(err, WebError::Auth(ref e) if e.is_network()));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_stale_context_closes_newer_one() {
        let (cache, service) = cache();
        service.add_session("alice", "abc123");
        let stale = cache.validate_session("alice", "abc123").await.unwrap();

        // Evict the first context behind the caller's back, then cache a new one.
        cache.inner.contexts.remove(&stale.key().cache_key());
        let fresh = cache.validate_session("alice", "abc123").await.unwrap();
        assert!(!Arc::ptr_eq(&stale, &fresh));

        cache.invalidate(&stale).await.unwrap();

        assert!(stale.is_closed());
        assert!(fresh.is_closed());
        assert_eq!(service.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_closes_everything() {
        let (cache, service) = cache();
        service.add_session("alice", "abc123");
        service.add_session("bob", "def456");
        let alice = cache.validate_session("alice", "abc123").await.unwrap();
        let bob = cache.validate_session("bob", "def456").await.unwrap();

        assert_eq!(cache.shutdown(), 2);

        assert!(alice.is_closed());
        assert!(bob.is_closed());
        assert!(cache.is_empty());
        assert_eq!(service.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_reaper_evicts_expired_contexts() {
        let service = MockAuthService::new();
        service.add_session("alice", "abc123");
        let cache = SessionCache::start(
            WebConfig::new("auth:3025")
                .with_session_ttl(Duration::from_millis(20))
                .with_cleanup_interval(Duration::from_millis(10)),
            Arc::new(MockConnector::new(service.clone())),
        )
        .unwrap();

        let ctx = cache.validate_session("alice", "abc123").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(ctx.is_closed());
        assert!(cache.is_empty());
        assert_eq!(service.teardowns(), 1);
        cache.shutdown();
    }
}
