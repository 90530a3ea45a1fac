//! Per-session context owning a connection to the authentication service.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{Instrument, Span, debug, info_span};
use webgate_auth::{AgentSigner, SharedClient, WebSession};

use crate::cache::SessionCache;
use crate::error::{Result, WebError};

/// Cache key of a session: the user plus the session id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    user: String,
    session_id: String,
}

impl SessionKey {
    pub fn new(user: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            session_id: session_id.into(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Key string used in the store.
    ///
    /// The user is length-prefixed, so distinct pairs never share a key
    /// whatever bytes the user or session id contain.
    pub fn cache_key(&self) -> String {
        format!("{}:{}:{}", self.user.len(), self.user, self.session_id)
    }
}

/// Credentials a proxied SSH connection can authenticate with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "signers", rename_all = "snake_case")]
pub enum SshAuthMethod {
    /// Public key authentication with the agent's signers.
    PublicKeys(Vec<AgentSigner>),
}

/// A validated web session together with its live connection.
///
/// The context is the only owner allowed to close its connection. Closing
/// is idempotent: whichever of invalidation, eviction or loser cleanup gets
/// there first tears the connection down, later calls do nothing.
pub struct SessionContext {
    key: SessionKey,
    session: WebSession,
    client: SharedClient,
    closed: AtomicBool,
    span: Span,
}

impl SessionContext {
    /// Wrap a freshly opened connection.
    pub fn new(user: impl Into<String>, session: WebSession, client: SharedClient) -> Self {
        let user = user.into();
        let span = info_span!("web_session", user = %user, sess = %session.short_id());
        Self {
            key: SessionKey::new(user, session.id.clone()),
            session,
            client,
            closed: AtomicBool::new(false),
            span,
        }
    }

    /// The authenticated user.
    pub fn user(&self) -> &str {
        self.key.user()
    }

    /// The web session this context was validated against.
    pub fn web_session(&self) -> &WebSession {
        &self.session
    }

    /// Key the context is cached under.
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Span carrying the context's logging identity.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Check if the connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The connection to the authentication service.
    pub fn client(&self) -> Result<SharedClient> {
        if self.is_closed() {
            return Err(WebError::Closed);
        }
        Ok(SharedClient::clone(&self.client))
    }

    /// Ask the authentication service for a renewed session for this user.
    pub async fn create_web_session(&self) -> Result<WebSession> {
        let client = self.client()?;
        let session = client
            .create_web_session(self.user(), &self.session.id)
            .instrument(self.span.clone())
            .await?;
        Ok(session)
    }

    /// SSH credentials derived from the connection's agent signers.
    pub async fn auth_methods(&self) -> Result<Vec<SshAuthMethod>> {
        let client = self.client()?;
        let signers = client
            .get_agent_signers()
            .instrument(self.span.clone())
            .await?;
        Ok(vec![SshAuthMethod::PublicKeys(signers)])
    }

    /// Terminate the session. Shorthand for [`SessionCache::invalidate`].
    pub async fn invalidate(&self, cache: &SessionCache) -> Result<()> {
        cache.invalidate(self).await
    }

    /// Close the connection. Only the first call reaches the connection.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let _enter = self.span.enter();
        debug!("Closing session context");
        self.client.close()?;
        Ok(())
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("user", &self.user())
            .field("session", &self.session.short_id())
            .field("closed", &self.is_closed())
            .finish()
    }
}
