//! Web session layer for the webgate access gateway.
//!
//! Browsers authenticate once with a password and one-time code and then
//! carry a `session` cookie. Every request with that cookie is validated
//! against the authentication service; this crate caches the result so the
//! gateway keeps one connection per live session instead of reconnecting on
//! every page hit.
//!
//! # Features
//!
//! - At most one cached [`SessionContext`] per (user, session id)
//! - TTL expiry and a capacity bound, both closing the evicted connection
//! - Tombstones so an invalidated session is not revived by a stale lookup
//! - Session cookie encoding with `HttpOnly`, `Path=/` and optional `Secure`
//! - Password login, certificate issuance and signup token redemption
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use webgate_web::{SessionCache, WebConfig};
//!
//! let config = WebConfig::load("webgate.toml")?;
//! let cache = SessionCache::start(config, Arc::new(connector))?;
//!
//! let (user, sid) = cache.session_from_headers(request.headers())?;
//! let ctx = cache.validate_session(&user, &sid).await?;
//! let methods = ctx.auth_methods().await?;
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod cookie;
pub mod error;
pub mod telemetry;

pub use cache::{CertificateRequest, CloseOnEvict, SessionCache, SshLogin};
pub use config::{SessionSettings, WebConfig};
pub use context::{SessionContext, SessionKey, SshAuthMethod};
pub use cookie::{CookieCodec, JsonCookieCodec, SESSION_COOKIE_NAME, SessionCookie};
pub use error::{ErrorResponse, Result, WebError};
