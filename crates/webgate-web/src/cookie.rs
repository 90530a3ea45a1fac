//! Session cookie handling.
//!
//! The browser holds a single cookie, `session`, whose value identifies the
//! (user, session id) pair. How the pair is encoded is up to a
//! [`CookieCodec`]; the attributes are always `Path=/` and `HttpOnly`, plus
//! `Secure` when the gateway is served over TLS.

use std::fmt;

use axum::http::{HeaderMap, HeaderValue, header};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WebError};

/// Name of the session cookie.
pub const SESSION_COOKIE_NAME: &str = "session";

/// Path the session cookie is scoped to.
pub const SESSION_COOKIE_PATH: &str = "/";

// ─────────────────────────────────────────────────────────────────────────────
// Codec
// ─────────────────────────────────────────────────────────────────────────────

/// Encodes the (user, session id) pair into a cookie value and back.
pub trait CookieCodec: Send + Sync + fmt::Debug {
    fn encode(&self, user: &str, session_id: &str) -> Result<String>;

    fn decode(&self, value: &str) -> Result<(String, String)>;
}

/// Default codec: a small JSON object, base64url encoded without padding.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCookieCodec;

#[derive(Serialize)]
struct CookiePayloadRef<'a> {
    user: &'a str,
    sid: &'a str,
}

#[derive(Deserialize)]
struct CookiePayload {
    user: String,
    sid: String,
}

impl CookieCodec for JsonCookieCodec {
    fn encode(&self, user: &str, session_id: &str) -> Result<String> {
        let json = serde_json::to_vec(&CookiePayloadRef {
            user,
            sid: session_id,
        })
        .map_err(|e| WebError::Cookie(e.to_string()))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    fn decode(&self, value: &str) -> Result<(String, String)> {
        let json = URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|e| WebError::Cookie(format!("not base64: {e}")))?;
        let payload: CookiePayload =
            serde_json::from_slice(&json).map_err(|e| WebError::Cookie(format!("bad payload: {e}")))?;
        if payload.user.is_empty() || payload.sid.is_empty() {
            return Err(WebError::Cookie("empty user or session id".into()));
        }
        if payload.user.contains('\0') || payload.sid.contains('\0') {
            return Err(WebError::Cookie("NUL byte in user or session id".into()));
        }
        Ok((payload.user, payload.sid))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cookie attributes
// ─────────────────────────────────────────────────────────────────────────────

/// A `Set-Cookie` for the session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: &'static str,
    pub value: String,
    pub path: &'static str,
    pub http_only: bool,
    pub secure: bool,
    /// `Some(0)` asks the browser to drop the cookie.
    pub max_age: Option<u64>,
}

impl SessionCookie {
    /// Cookie carrying an encoded session.
    pub fn new(value: impl Into<String>, secure: bool) -> Self {
        Self {
            name: SESSION_COOKIE_NAME,
            value: value.into(),
            path: SESSION_COOKIE_PATH,
            http_only: true,
            secure,
            max_age: None,
        }
    }

    /// Cookie that clears the session: empty value, same attributes.
    pub fn cleared(secure: bool) -> Self {
        Self {
            max_age: Some(0),
            ..Self::new(String::new(), secure)
        }
    }

    /// Render as a `Set-Cookie` header value.
    pub fn to_header_value(&self) -> Result<HeaderValue> {
        HeaderValue::from_str(&self.to_string())
            .map_err(|e| WebError::Cookie(format!("value not allowed in a header: {e}")))
    }

    /// Append this cookie as a `Set-Cookie` header.
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<()> {
        headers.append(header::SET_COOKIE, self.to_header_value()?);
        Ok(())
    }
}

impl fmt::Display for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}; Path={}", self.name, self.value, self.path)?;
        if let Some(max_age) = self.max_age {
            write!(f, "; Max-Age={max_age}")?;
        }
        if self.http_only {
            write!(f, "; HttpOnly")?;
        }
        if self.secure {
            write!(f, "; Secure")?;
        }
        Ok(())
    }
}

/// Value of the named cookie in a request's `Cookie` headers.
pub fn find_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}
