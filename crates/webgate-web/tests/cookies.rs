//! Session cookie integration tests.

mod common;

use anyhow::Result;
use axum::http::{HeaderMap, HeaderValue, header};
use common::{TestGateway, test_config};
use webgate_web::WebError;

fn set_cookies(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// Turn a `Set-Cookie` into the `Cookie` header a browser would send back.
fn echo_cookie(set_cookie: &str) -> HeaderMap {
    let pair = set_cookie.split(';').next().unwrap();
    let mut headers = HeaderMap::new();
    headers.insert(header::COOKIE, HeaderValue::from_str(pair).unwrap());
    headers
}

#[tokio::test]
async fn test_cookie_roundtrip_validates_session() -> Result<()> {
    let gw = TestGateway::new()?;
    gw.seed_alice();

    let mut response = HeaderMap::new();
    gw.cache.set_session_cookie(&mut response, "alice", "abc123")?;

    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 1);
    let request = echo_cookie(&cookies[0]);

    let (user, sid) = gw.cache.session_from_headers(&request)?;
    assert_eq!((user.as_str(), sid.as_str()), ("alice", "abc123"));

    let ctx = gw.cache.validate_session(&user, &sid).await?;
    assert_eq!(ctx.user(), "alice");

    Ok(())
}

#[test]
fn test_secure_cookie_attributes() -> Result<()> {
    let gw = TestGateway::with_config(test_config().with_secure_cookies(true))?;

    let mut headers = HeaderMap::new();
    gw.cache.set_session_cookie(&mut headers, "alice", "abc123")?;

    let cookie = &set_cookies(&headers)[0];
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("; Path=/"));
    assert!(cookie.contains("; HttpOnly"));
    assert!(cookie.ends_with("; Secure"));

    Ok(())
}

#[test]
fn test_insecure_cookie_attributes() -> Result<()> {
    let gw = TestGateway::with_config(test_config().with_secure_cookies(false))?;

    let mut headers = HeaderMap::new();
    gw.cache.set_session_cookie(&mut headers, "alice", "abc123")?;

    let cookie = &set_cookies(&headers)[0];
    assert!(cookie.contains("; Path=/"));
    assert!(cookie.contains("; HttpOnly"));
    assert!(!cookie.contains("Secure"));

    Ok(())
}

#[test]
fn test_clear_cookie_keeps_attributes() -> Result<()> {
    let gw = TestGateway::new()?;

    let mut headers = HeaderMap::new();
    gw.cache.clear_session_cookie(&mut headers)?;

    assert_eq!(
        set_cookies(&headers),
        vec!["session=; Path=/; Max-Age=0; HttpOnly; Secure".to_string()]
    );

    // A cleared cookie echoed back carries no session.
    let request = echo_cookie(&set_cookies(&headers)[0]);
    assert!(matches!(
        gw.cache.session_from_headers(&request),
        Err(WebError::Cookie(_))
    ));

    Ok(())
}

#[test]
fn test_missing_or_forged_cookie() -> Result<()> {
    let gw = TestGateway::new()?;

    let err = gw.cache.session_from_headers(&HeaderMap::new()).unwrap_err();
    assert!(matches!(err, WebError::Cookie(_)));
    assert_eq!(err.status().0, axum::http::StatusCode::BAD_REQUEST);

    let mut headers = HeaderMap::new();
    headers.insert(header::COOKIE, HeaderValue::from_static("session=not-a-session"));
    assert!(matches!(
        gw.cache.session_from_headers(&headers),
        Err(WebError::Cookie(_))
    ));

    Ok(())
}
