//! Credentials used to open a connection to the authentication service.

use std::fmt;

use crate::error::{AuthError, Result};

/// Login name used for connections authenticated with a signup token,
/// since no account exists yet.
pub const SIGNUP_TOKEN_LOGIN: &str = "tokenAuth";

/// How a connection proves who it is.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Password and one-time code of an interactive login.
    Password {
        user: String,
        password: String,
        otp_token: String,
    },
    /// An existing web session.
    WebSession { user: String, session_id: String },
    /// A signup token from an invite.
    SignupToken { token: String },
}

impl Credentials {
    /// Password plus one-time code credentials.
    pub fn password(
        user: impl Into<String>,
        password: impl Into<String>,
        otp_token: impl Into<String>,
    ) -> Result<Self> {
        let user = user.into();
        let password = password.into();
        require("user", &user)?;
        require("password", &password)?;
        Ok(Credentials::Password {
            user,
            password,
            otp_token: otp_token.into(),
        })
    }

    /// Web session credentials.
    pub fn web_session(user: impl Into<String>, session_id: impl Into<String>) -> Result<Self> {
        let user = user.into();
        let session_id = session_id.into();
        require("user", &user)?;
        require("session id", &session_id)?;
        Ok(Credentials::WebSession { user, session_id })
    }

    /// Signup token credentials.
    pub fn signup_token(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        require("signup token", &token)?;
        Ok(Credentials::SignupToken { token })
    }

    /// Login name the connection is opened as.
    pub fn login(&self) -> &str {
        match self {
            Credentials::Password { user, .. } | Credentials::WebSession { user, .. } => user,
            Credentials::SignupToken { .. } => SIGNUP_TOKEN_LOGIN,
        }
    }

    /// Short method name for logs.
    pub fn method(&self) -> &'static str {
        match self {
            Credentials::Password { .. } => "password",
            Credentials::WebSession { .. } => "web-session",
            Credentials::SignupToken { .. } => "signup-token",
        }
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(AuthError::BadParameter(format!("missing {field}")));
    }
    if value.contains('\0') {
        return Err(AuthError::BadParameter(format!("{field} contains a NUL byte")));
    }
    Ok(())
}

// Secrets stay out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Password { user, .. } => f
                .debug_struct("Password")
                .field("user", user)
                .finish_non_exhaustive(),
            Credentials::WebSession { user, .. } => f
                .debug_struct("WebSession")
                .field("user", user)
                .finish_non_exhaustive(),
            Credentials::SignupToken { .. } => f.debug_struct("SignupToken").finish_non_exhaustive(),
        }
    }
}
