//! In-memory authentication service for tests.
//!
//! [`MockAuthService`] keeps users, sessions, invites and certificate
//! authorities in memory and counts every round trip, so tests can assert
//! how often the network would have been used. [`MockConnector`] opens
//! connections to it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::{AuthClient, Connector, SharedClient};
use crate::credentials::Credentials;
use crate::error::{AuthError, Result};
use crate::types::{AgentSigner, CertAuthority, CertAuthorityKind, InviteInfo, WebSession};

#[derive(Debug, Default)]
struct Account {
    password: String,
    otp_token: String,
}

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<String, Account>,
    sessions: HashMap<(String, String), WebSession>,
    invites: HashMap<String, InviteInfo>,
    authorities: Vec<CertAuthority>,
}

/// Shared state of the mock service plus call counters.
#[derive(Debug, Default)]
pub struct MockAuthService {
    state: Mutex<State>,
    latency: Mutex<Duration>,
    unreachable: AtomicBool,
    next_client: AtomicU64,
    connects: AtomicUsize,
    opened: AtomicUsize,
    session_info_calls: AtomicUsize,
    deletes: AtomicUsize,
    close_calls: AtomicUsize,
    teardowns: AtomicUsize,
}

impl MockAuthService {
    /// Create an empty service.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register an account.
    pub fn add_user(&self, user: &str, password: &str, otp_token: &str) {
        self.state.lock().accounts.insert(
            user.to_string(),
            Account {
                password: password.to_string(),
                otp_token: otp_token.to_string(),
            },
        );
    }

    /// Register a web session as if the user had signed in earlier.
    pub fn add_session(&self, user: &str, session_id: &str) -> WebSession {
        let session = WebSession::new(session_id, user);
        self.state
            .lock()
            .sessions
            .insert((user.to_string(), session_id.to_string()), session.clone());
        session
    }

    /// Register a signup token.
    pub fn add_invite(&self, token: &str, invite: InviteInfo) {
        self.state.lock().invites.insert(token.to_string(), invite);
    }

    /// Register a certificate authority.
    pub fn add_authority(&self, authority: CertAuthority) {
        self.state.lock().authorities.push(authority);
    }

    /// Delay applied to every connect and session lookup.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Make every connect fail with a network error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Check if the web session exists.
    pub fn has_session(&self, user: &str, session_id: &str) -> bool {
        self.state
            .lock()
            .sessions
            .contains_key(&(user.to_string(), session_id.to_string()))
    }

    /// Check if the account exists.
    pub fn has_user(&self, user: &str) -> bool {
        self.state.lock().accounts.contains_key(user)
    }

    /// Connection attempts, successful or not.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Connections successfully opened.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Round trips to fetch session info.
    pub fn session_info_calls(&self) -> usize {
        self.session_info_calls.load(Ordering::SeqCst)
    }

    /// Round trips to delete a session.
    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Calls to `close`, repeated calls on one connection included.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Connections actually torn down.
    pub fn teardowns(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }

    /// Opened connections not yet torn down.
    pub fn open_connections(&self) -> usize {
        self.opened().saturating_sub(self.teardowns())
    }

    async fn delay(&self) {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_password(&self, user: &str, password: &str, otp_token: Option<&str>) -> Result<()> {
        let state = self.state.lock();
        let account = state
            .accounts
            .get(user)
            .ok_or_else(|| AuthError::AccessDenied(format!("bad credentials for {user}")))?;
        let otp_ok = otp_token.is_none_or(|otp| otp == account.otp_token);
        if account.password != password || !otp_ok {
            return Err(AuthError::AccessDenied(format!("bad credentials for {user}")));
        }
        Ok(())
    }

    fn new_session(&self, user: &str) -> WebSession {
        let session = WebSession::new(uuid::Uuid::new_v4().simple().to_string(), user)
            .with_expires_at(chrono::Utc::now() + chrono::Duration::minutes(10));
        self.state
            .lock()
            .sessions
            .insert((user.to_string(), session.id.clone()), session.clone());
        session
    }
}

/// Connector that dials a [`MockAuthService`].
#[derive(Debug, Clone)]
pub struct MockConnector {
    service: Arc<MockAuthService>,
}

impl MockConnector {
    pub fn new(service: Arc<MockAuthService>) -> Self {
        Self { service }
    }

    /// The service this connector dials.
    pub fn service(&self) -> &Arc<MockAuthService> {
        &self.service
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, server: &str, credentials: Credentials) -> Result<SharedClient> {
        let service = &self.service;
        service.delay().await;
        service.connects.fetch_add(1, Ordering::SeqCst);

        if service.unreachable.load(Ordering::SeqCst) {
            return Err(AuthError::Network(format!("{server}: connection refused")));
        }

        match &credentials {
            Credentials::Password {
                user,
                password,
                otp_token,
            } => service.check_password(user, password, Some(otp_token))?,
            Credentials::SignupToken { token } => {
                if !service.state.lock().invites.contains_key(token) {
                    return Err(AuthError::AccessDenied("unknown signup token".into()));
                }
            }
            // Session credentials are checked lazily, on the first request.
            Credentials::WebSession { .. } => {}
        }

        service.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockAuthClient {
            id: service.next_client.fetch_add(1, Ordering::SeqCst),
            login: credentials.login().to_string(),
            service: Arc::clone(service),
            closed: AtomicBool::new(false),
        }))
    }
}

/// A connection to a [`MockAuthService`].
#[derive(Debug)]
pub struct MockAuthClient {
    id: u64,
    login: String,
    service: Arc<MockAuthService>,
    closed: AtomicBool,
}

impl MockAuthClient {
    pub fn id(&self) -> u64 {
        self.id
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AuthError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl AuthClient for MockAuthClient {
    async fn sign_in(&self, user: &str, password: &str) -> Result<WebSession> {
        self.ensure_open()?;
        self.service.check_password(user, password, None)?;
        Ok(self.service.new_session(user))
    }

    async fn get_web_session_info(&self, user: &str, session_id: &str) -> Result<WebSession> {
        self.ensure_open()?;
        self.service.session_info_calls.fetch_add(1, Ordering::SeqCst);
        self.service.delay().await;

        self.service
            .state
            .lock()
            .sessions
            .get(&(user.to_string(), session_id.to_string()))
            .cloned()
            .ok_or_else(|| AuthError::NotFound(format!("web session {user}/{session_id}")))
    }

    async fn create_web_session(&self, user: &str, prev_session_id: &str) -> Result<WebSession> {
        self.ensure_open()?;
        if !self.service.has_session(user, prev_session_id) {
            return Err(AuthError::NotFound(format!(
                "web session {user}/{prev_session_id}"
            )));
        }
        Ok(self.service.new_session(user))
    }

    async fn delete_web_session(&self, user: &str, session_id: &str) -> Result<()> {
        self.ensure_open()?;
        self.service.deletes.fetch_add(1, Ordering::SeqCst);
        self.service
            .state
            .lock()
            .sessions
            .remove(&(user.to_string(), session_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| AuthError::NotFound(format!("web session {user}/{session_id}")))
    }

    async fn generate_user_cert(
        &self,
        public_key: &[u8],
        user: &str,
        ttl: Duration,
    ) -> Result<Vec<u8>> {
        self.ensure_open()?;
        if public_key.is_empty() {
            return Err(AuthError::BadParameter("empty public key".into()));
        }
        if ttl.is_zero() {
            return Err(AuthError::BadParameter("certificate ttl must be positive".into()));
        }
        let mut cert = format!("cert:{user}:{}:", ttl.as_secs()).into_bytes();
        cert.extend_from_slice(public_key);
        Ok(cert)
    }

    async fn get_cert_authorities(&self, kind: CertAuthorityKind) -> Result<Vec<CertAuthority>> {
        self.ensure_open()?;
        Ok(self
            .service
            .state
            .lock()
            .authorities
            .iter()
            .filter(|ca| ca.kind == kind)
            .cloned()
            .collect())
    }

    async fn get_agent_signers(&self) -> Result<Vec<AgentSigner>> {
        self.ensure_open()?;
        Ok(vec![AgentSigner {
            public_key: format!("pub:{}", self.login).into_bytes(),
            certificate: Some(format!("cert:{}", self.login).into_bytes()),
            comment: self.login.clone(),
        }])
    }

    async fn get_signup_token_data(&self, token: &str) -> Result<InviteInfo> {
        self.ensure_open()?;
        self.service
            .state
            .lock()
            .invites
            .get(token)
            .cloned()
            .ok_or_else(|| AuthError::NotFound("signup token".into()))
    }

    async fn create_user_with_token(
        &self,
        token: &str,
        password: &str,
        otp_token: &str,
    ) -> Result<WebSession> {
        self.ensure_open()?;
        let invite = self
            .service
            .state
            .lock()
            .invites
            .remove(token)
            .ok_or_else(|| AuthError::NotFound("signup token".into()))?;
        self.service.add_user(&invite.user, password, otp_token);
        Ok(self.service.new_session(&invite.user))
    }

    fn close(&self) -> Result<()> {
        self.service.close_calls.fetch_add(1, Ordering::SeqCst);
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.service.teardowns.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector() -> MockConnector {
        let service = MockAuthService::new();
        service.add_user("alice", "secret", "123456");
        MockConnector::new(service)
    }

    #[tokio::test]
    async fn test_password_connect_checks_otp() {
        let connector = connector();

        let good = Credentials::password("alice", "secret", "123456").unwrap();
        assert!(connector.connect("auth:3025", good).await.is_ok());

        let bad = Credentials::password("alice", "secret", "000000").unwrap();
        let err = connector.connect("auth:3025", bad).await.unwrap_err();
        assert!(err.is_access_denied());
        assert_eq!(connector.service().connects(), 2);
        assert_eq!(connector.service().opened(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let connector = connector();
        connector.service().set_unreachable(true);

        let creds = Credentials::web_session("alice", "abc123").unwrap();
        let err = connector.connect("auth:3025", creds).await.unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_closed_client_rejects_calls() {
        let connector = connector();
        connector.service().add_session("alice", "abc123");
        let creds = Credentials::web_session("alice", "abc123").unwrap();
        let client = connector.connect("auth:3025", creds).await.unwrap();

        client.close().unwrap();
        client.close().unwrap();

        let err = client.get_web_session_info("alice", "abc123").await.unwrap_err();
        assert_eq!(err, AuthError::Closed);
        assert_eq!(connector.service().close_calls(), 2);
        assert_eq!(connector.service().teardowns(), 1);
        assert_eq!(connector.service().open_connections(), 0);
    }

    #[tokio::test]
    async fn test_signup_flow() {
        let connector = connector();
        connector.service().add_invite(
            "tok",
            InviteInfo {
                user: "bob".into(),
                qr_image: vec![0x89, 0x50],
                otp_first_values: vec!["111111".into()],
            },
        );

        let creds = Credentials::signup_token("tok").unwrap();
        let client = connector.connect("auth:3025", creds).await.unwrap();
        assert_eq!(client.get_signup_token_data("tok").await.unwrap().user, "bob");

        let session = client.create_user_with_token("tok", "pw", "222222").await.unwrap();
        assert_eq!(session.user, "bob");
        assert!(connector.service().has_user("bob"));
        assert!(client.get_signup_token_data("tok").await.unwrap_err().is_not_found());
    }
}
