//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use webgate_auth::{CertAuthority, CertAuthorityKind, InviteInfo, MockAuthService, MockConnector};
use webgate_web::{SessionCache, WebConfig};

pub const AUTH_SERVER: &str = "auth.test:3025";

/// A session cache wired to an in-memory authentication service.
pub struct TestGateway {
    pub cache: SessionCache,
    pub service: Arc<MockAuthService>,
}

impl TestGateway {
    /// Gateway with default settings and no background cleanup.
    pub fn new() -> Result<Self> {
        Self::with_config(test_config())
    }

    pub fn with_config(config: WebConfig) -> Result<Self> {
        let service = MockAuthService::new();
        let connector = Arc::new(MockConnector::new(service.clone()));
        let cache = SessionCache::new(config, connector)?;
        Ok(Self { cache, service })
    }

    /// Gateway whose cached contexts expire after `ttl`.
    pub fn with_session_ttl(ttl: Duration) -> Result<Self> {
        Self::with_config(test_config().with_session_ttl(ttl))
    }

    /// Register `alice` with a password, an OTP code and one web session.
    pub fn seed_alice(&self) {
        self.service.add_user("alice", "secret", "123456");
        self.service.add_session("alice", "abc123");
    }

    pub fn seed_invite(&self, token: &str, user: &str) {
        self.service.add_invite(
            token,
            InviteInfo {
                user: user.to_string(),
                qr_image: b"qr".to_vec(),
                otp_first_values: vec!["111111".to_string(), "222222".to_string()],
            },
        );
    }

    pub fn seed_host_authority(&self, domain: &str) {
        self.service.add_authority(CertAuthority {
            kind: CertAuthorityKind::Host,
            domain_name: domain.to_string(),
            checking_keys: vec![format!("host-key:{domain}").into_bytes()],
        });
    }
}

/// Configuration used by most tests: one auth server, no cleanup task.
pub fn test_config() -> WebConfig {
    WebConfig::new(AUTH_SERVER).with_cleanup_task(false)
}
