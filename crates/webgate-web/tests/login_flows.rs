//! Login, certificate and signup integration tests.
//!
//! These operations use a throwaway connection per call; the tests check
//! that it is always closed and that nothing is cached.

mod common;

use std::time::Duration;

use anyhow::Result;
use common::TestGateway;
use webgate_web::{CertificateRequest, SshAuthMethod, WebError};

fn cert_request(otp_token: &str) -> CertificateRequest {
    CertificateRequest {
        user: "alice".to_string(),
        password: "secret".to_string(),
        otp_token: otp_token.to_string(),
        public_key: b"ssh-ed25519 AAAA".to_vec(),
        ttl: Duration::from_secs(3600),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Password login
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_authenticate_returns_usable_session() -> Result<()> {
    let gw = TestGateway::new()?;
    gw.seed_alice();

    let session = gw.cache.authenticate("alice", "secret", "123456").await?;

    assert_eq!(session.user, "alice");
    assert!(gw.service.has_session("alice", &session.id));
    assert!(gw.cache.is_empty());
    assert_eq!(gw.service.open_connections(), 0);

    // The new session validates like any other.
    let ctx = gw.cache.validate_session("alice", &session.id).await?;
    assert_eq!(ctx.web_session().id, session.id);

    Ok(())
}

#[tokio::test]
async fn test_authenticate_rejects_bad_otp() -> Result<()> {
    let gw = TestGateway::new()?;
    gw.seed_alice();

    let err = gw
        .cache
        .authenticate("alice", "secret", "000000")
        .await
        .unwrap_err();

    assert!(matches!(err, WebError::Auth(ref e) if e.is_access_denied()));
    assert_eq!(err.status().0, axum::http::StatusCode::UNAUTHORIZED);
    assert_eq!(gw.service.open_connections(), 0);

    Ok(())
}

#[tokio::test]
async fn test_authenticate_requires_password() -> Result<()> {
    let gw = TestGateway::new()?;
    gw.seed_alice();

    let err = gw.cache.authenticate("alice", "", "123456").await.unwrap_err();

    assert_eq!(err.status().0, axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(gw.service.connects(), 0);

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Certificates
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_issue_certificate_includes_host_authorities() -> Result<()> {
    let gw = TestGateway::new()?;
    gw.seed_alice();
    gw.seed_host_authority("example.com");

    let login = gw.cache.issue_certificate(&cert_request("123456")).await?;

    assert!(login.cert.starts_with(b"cert:alice:3600:"));
    assert!(login.cert.ends_with(b"ssh-ed25519 AAAA"));
    assert_eq!(login.host_signers.len(), 1);
    assert_eq!(login.host_signers[0].domain_name, "example.com");
    assert_eq!(gw.service.open_connections(), 0);

    let json = serde_json::to_value(&login)?;
    assert!(json.get("host_signers").is_some());

    Ok(())
}

#[tokio::test]
async fn test_issue_certificate_failure_closes_connection() -> Result<()> {
    let gw = TestGateway::new()?;
    gw.seed_alice();

    let mut req = cert_request("123456");
    req.public_key.clear();
    let err = gw.cache.issue_certificate(&req).await.unwrap_err();

    assert!(matches!(err, WebError::Auth(_)));
    assert_eq!(gw.service.opened(), 1);
    assert_eq!(gw.service.open_connections(), 0);

    Ok(())
}

#[test]
fn test_certificate_request_debug_hides_secrets() {
    let rendered = format!("{:?}", cert_request("123456"));

    assert!(rendered.contains("alice"));
    assert!(!rendered.contains("secret"));
    assert!(!rendered.contains("123456"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Signup
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_invite_info_does_not_redeem_token() -> Result<()> {
    let gw = TestGateway::new()?;
    gw.seed_invite("tok-1", "carol");

    let first = gw.cache.get_invite_info("tok-1").await?;
    let second = gw.cache.get_invite_info("tok-1").await?;

    assert_eq!(first, second);
    assert_eq!(first.user, "carol");
    assert_eq!(first.otp_first_values.len(), 2);
    assert_eq!(gw.service.open_connections(), 0);

    Ok(())
}

#[tokio::test]
async fn test_create_user_redeems_token_once() -> Result<()> {
    let gw = TestGateway::new()?;
    gw.seed_invite("tok-1", "carol");

    let session = gw.cache.create_user("tok-1", "hunter2", "111111").await?;

    assert_eq!(session.user, "carol");
    assert!(gw.service.has_user("carol"));

    let err = gw
        .cache
        .create_user("tok-1", "hunter2", "111111")
        .await
        .unwrap_err();
    assert!(matches!(err, WebError::Auth(ref e) if e.is_access_denied()));

    // The new account can sign in and use its session.
    let ctx = gw.cache.validate_session("carol", &session.id).await?;
    let methods = ctx.auth_methods().await?;
    let SshAuthMethod::PublicKeys(signers) = &methods[0];
    assert_eq!(signers[0].comment, "carol");

    assert_eq!(gw.service.open_connections(), 1);

    Ok(())
}

#[tokio::test]
async fn test_unknown_signup_token() -> Result<()> {
    let gw = TestGateway::new()?;

    let err = gw.cache.get_invite_info("nope").await.unwrap_err();

    assert!(matches!(err, WebError::Auth(ref e) if e.is_access_denied()));

    Ok(())
}
