//! Authentication service client interface for webgate.
//!
//! The gateway never speaks the authentication protocol itself. It reaches
//! the remote authentication service through an [`AuthClient`] connection
//! that a [`Connector`] opens with one of three [`Credentials`] flavours:
//!
//! - password plus one-time code, for interactive logins
//! - an existing web session, for requests carrying a session cookie
//! - a signup token, for invite redemption and account creation
//!
//! # Components
//!
//! - [`client`]: the [`AuthClient`] and [`Connector`] traits
//! - [`credentials`]: credential construction and validation
//! - [`types`]: sessions, certificate authorities, signers, invites
//! - `mock`: an in-memory authentication service (feature `testing`)

pub mod client;
pub mod credentials;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod mock;
pub mod types;

pub use client::{AuthClient, Connector, SharedClient};
pub use credentials::{Credentials, SIGNUP_TOKEN_LOGIN};
pub use error::{AuthError, Result};
#[cfg(any(test, feature = "testing"))]
pub use mock::{MockAuthService, MockConnector};
pub use types::{AgentSigner, CertAuthority, CertAuthorityKind, InviteInfo, WebSession};
