//! Data exchanged with the authentication service.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A web session issued by the authentication service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSession {
    /// Opaque session identifier.
    pub id: String,
    /// User the session belongs to.
    pub user: String,
    /// Server side expiry, when the service reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl WebSession {
    /// Create a session without an expiry.
    pub fn new(id: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user: user.into(),
            expires_at: None,
        }
    }

    /// Set the expiry time.
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Prefix of the id that is safe to put in logs.
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(4)
            .map_or(self.id.len(), |(idx, _)| idx);
        &self.id[..end]
    }
}

/// Category of certificate authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertAuthorityKind {
    /// Signs host certificates.
    Host,
    /// Signs user certificates.
    User,
}

impl fmt::Display for CertAuthorityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertAuthorityKind::Host => write!(f, "host"),
            CertAuthorityKind::User => write!(f, "user"),
        }
    }
}

/// A certificate authority and the public keys it is checked with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertAuthority {
    pub kind: CertAuthorityKind,
    pub domain_name: String,
    pub checking_keys: Vec<Vec<u8>>,
}

/// Signing material held by the agent of an authenticated connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSigner {
    /// Public half of the key, in SSH wire format.
    pub public_key: Vec<u8>,
    /// Certificate issued for the key, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Vec<u8>>,
    pub comment: String,
}

/// What a signup token reveals before it is redeemed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteInfo {
    /// Login the invite was issued for.
    pub user: String,
    /// PNG of the OTP provisioning QR code.
    pub qr_image: Vec<u8>,
    /// First values of the OTP sequence, for confirming enrolment.
    pub otp_first_values: Vec<String>,
}
