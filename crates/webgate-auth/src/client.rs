//! Connection traits for the authentication service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::credentials::Credentials;
use crate::error::Result;
use crate::types::{AgentSigner, CertAuthority, CertAuthorityKind, InviteInfo, WebSession};

/// A shared handle to an open connection.
pub type SharedClient = Arc<dyn AuthClient>;

// ============================================================================
// AuthClient Trait
// ============================================================================

/// An open, authenticated connection to the authentication service.
///
/// Every async method is one round trip. Implementations must return
/// [`AuthError::Closed`](crate::AuthError::Closed) once [`close`](Self::close)
/// has been called.
#[async_trait]
pub trait AuthClient: Send + Sync + std::fmt::Debug {
    /// Exchange a password for a new web session.
    async fn sign_in(&self, user: &str, password: &str) -> Result<WebSession>;

    /// Fetch an existing web session.
    async fn get_web_session_info(&self, user: &str, session_id: &str) -> Result<WebSession>;

    /// Issue a fresh web session based on an existing one.
    async fn create_web_session(&self, user: &str, prev_session_id: &str) -> Result<WebSession>;

    /// Delete a web session on the service side.
    async fn delete_web_session(&self, user: &str, session_id: &str) -> Result<()>;

    /// Sign `public_key` into a user certificate valid for `ttl`.
    async fn generate_user_cert(
        &self,
        public_key: &[u8],
        user: &str,
        ttl: Duration,
    ) -> Result<Vec<u8>>;

    /// List certificate authorities of one kind.
    async fn get_cert_authorities(&self, kind: CertAuthorityKind) -> Result<Vec<CertAuthority>>;

    /// Signers the connection's agent holds for the authenticated user.
    async fn get_agent_signers(&self) -> Result<Vec<AgentSigner>>;

    /// Read what a signup token was issued for, without redeeming it.
    async fn get_signup_token_data(&self, token: &str) -> Result<InviteInfo>;

    /// Redeem a signup token: create the account and its first session.
    async fn create_user_with_token(
        &self,
        token: &str,
        password: &str,
        otp_token: &str,
    ) -> Result<WebSession>;

    /// Tear the connection down. Does not wait on the network.
    fn close(&self) -> Result<()>;
}

// ============================================================================
// Connector Trait
// ============================================================================

/// Opens connections to the authentication service.
#[async_trait]
pub trait Connector: Send + Sync + std::fmt::Debug {
    /// Dial `server` and authenticate with `credentials`.
    async fn connect(&self, server: &str, credentials: Credentials) -> Result<SharedClient>;
}

#[async_trait]
impl<C: Connector + ?Sized> Connector for Arc<C> {
    async fn connect(&self, server: &str, credentials: Credentials) -> Result<SharedClient> {
        (**self).connect(server, credentials).await
    }
}
