//! Auth module tests against the full router.

use super::{
    session::DEFAULT_SESSION_TTL_SECONDS, AdminCredential, AuthConfig, AuthGate, AuthState,
    CreateOutcome, CredentialHasher, CredentialStore, Environment, MemoryCredentialStore,
    SessionKeys, StoreError, LOGIN_API_PATH, LOGIN_PATH,
};
use crate::api::app;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
        Request, StatusCode,
    },
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use jsonwebtoken::get_current_timestamp;
use secrecy::SecretString;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const TEST_SECRET: &str = "router-test-secret-0123456789abcdef";

struct Harness {
    router: Router,
    sessions: Arc<SessionKeys>,
    store: Arc<dyn CredentialStore>,
}

fn harness_with(environment: Environment, store: Arc<dyn CredentialStore>) -> Result<Harness> {
    let sessions = Arc::new(SessionKeys::new(
        &SecretString::from(TEST_SECRET),
        DEFAULT_SESSION_TTL_SECONDS,
    ));
    let hasher = CredentialHasher::new().map_err(|e| anyhow!(e))?;
    let state = Arc::new(AuthState::new(
        AuthConfig::new(environment),
        Arc::clone(&sessions),
        hasher,
        Arc::clone(&store),
    ));
    let gate = Arc::new(AuthGate::builder(Arc::clone(&sessions)).build());
    Ok(Harness {
        router: app(state, gate),
        sessions,
        store,
    })
}

fn harness(environment: Environment) -> Result<Harness> {
    harness_with(environment, Arc::new(MemoryCredentialStore::new()))
}

async fn post_pin(router: &Router, pin: &str) -> Result<Response> {
    let body = serde_json::json!({ "pin": pin }).to_string();
    let request = Request::builder()
        .method("POST")
        .uri(LOGIN_API_PATH)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body))?;
    Ok(router.clone().oneshot(request).await?)
}

async fn get(router: &Router, uri: &str, cookie: Option<&str>) -> Result<Response> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    Ok(router.clone().oneshot(builder.body(Body::empty())?).await?)
}

async fn json_body(response: Response) -> Result<Value> {
    let bytes = response.into_body().collect().await?.to_bytes();
    Ok(serde_json::from_slice(&bytes)?)
}

fn set_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// `session=<token>` from a `Set-Cookie` value, ready for a `Cookie` header.
fn cookie_pair(set_cookie: &str) -> Result<String> {
    set_cookie
        .split(';')
        .next()
        .map(str::to_string)
        .context("empty Set-Cookie")
}

fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
}

#[tokio::test]
async fn first_pin_sets_up_then_logs_in() -> Result<()> {
    let harness = harness(Environment::Development)?;

    let response = post_pin(&harness.router, "1234").await?;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = set_cookie(&response).context("setup must set a session cookie")?;
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Max-Age=86400"));
    assert!(cookie.contains("Path=/"));
    assert!(!cookie.contains("Secure"));
    let body = json_body(response).await?;
    assert_eq!(body["setup"], Value::Bool(true));
    assert_eq!(body["message"], "Setup successful");

    let response = post_pin(&harness.router, "1234").await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response).is_some());
    let body = json_body(response).await?;
    assert_eq!(body["setup"], Value::Bool(false));
    assert_eq!(body["message"], "Login successful");

    assert_eq!(harness.store.count().await?, 1);
    Ok(())
}

#[tokio::test]
async fn wrong_pin_is_rejected_without_cookie() -> Result<()> {
    let harness = harness(Environment::Development)?;
    post_pin(&harness.router, "1234").await?;

    let response = post_pin(&harness.router, "9999").await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookie(&response).is_none());
    let body = json_body(response).await?;
    assert_eq!(body["error"], "Invalid PIN");

    // The stored PIN is unchanged.
    let response = post_pin(&harness.router, "1234").await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn short_pin_is_rejected_before_storage() -> Result<()> {
    let harness = harness(Environment::Development)?;

    let response = post_pin(&harness.router, "123").await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(set_cookie(&response).is_none());
    let body = json_body(response).await?;
    assert_eq!(body["error"], "PIN must be at least 4 digits");

    assert_eq!(harness.store.count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn missing_body_is_a_validation_error() -> Result<()> {
    let harness = harness(Environment::Development)?;
    let request = Request::builder()
        .method("POST")
        .uri(LOGIN_API_PATH)
        .body(Body::empty())?;
    let response = harness.router.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(harness.store.count().await?, 0);
    Ok(())
}

struct FailingStore;

#[async_trait]
impl CredentialStore for FailingStore {
    async fn find_one(&self) -> Result<Option<AdminCredential>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn create_if_absent(&self, _pin_hash: &str) -> Result<CreateOutcome, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
}

#[tokio::test]
async fn store_failure_is_a_generic_internal_error() -> Result<()> {
    let harness = harness_with(Environment::Development, Arc::new(FailingStore))?;

    let response = post_pin(&harness.router, "1234").await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(set_cookie(&response).is_none());
    let body = json_body(response).await?;
    assert_eq!(body["error"], "Internal server error");

    let response = get(&harness.router, "/health", None).await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}

#[tokio::test]
async fn concurrent_first_submissions_create_one_credential() -> Result<()> {
    let harness = harness(Environment::Development)?;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let router = harness.router.clone();
        tasks.push(tokio::spawn(
            async move { post_pin(&router, "1234").await },
        ));
    }

    let mut setups = 0;
    for task in tasks {
        let response = task.await??;
        assert_eq!(response.status(), StatusCode::OK);
        if json_body(response).await?["setup"] == Value::Bool(true) {
            setups += 1;
        }
    }

    assert_eq!(setups, 1);
    assert_eq!(harness.store.count().await?, 1);
    Ok(())
}

#[tokio::test]
async fn concurrent_different_pins_keep_the_winner() -> Result<()> {
    let harness = harness(Environment::Development)?;

    let mut tasks = Vec::new();
    for pin in ["1111", "2222", "3333", "4444"] {
        let router = harness.router.clone();
        tasks.push(tokio::spawn(async move {
            let response = post_pin(&router, pin).await?;
            Ok::<_, anyhow::Error>((pin, response.status()))
        }));
    }

    let mut accepted = Vec::new();
    for task in tasks {
        let (pin, status) = task.await??;
        match status {
            StatusCode::OK => accepted.push(pin),
            StatusCode::UNAUTHORIZED => {}
            other => return Err(anyhow!("unexpected status {other} for {pin}")),
        }
    }

    assert_eq!(accepted.len(), 1);
    assert_eq!(harness.store.count().await?, 1);
    let winner = accepted.first().context("one PIN must win")?;
    assert_eq!(post_pin(&harness.router, winner).await?.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn login_status_reports_setup_mode() -> Result<()> {
    let harness = harness(Environment::Development)?;

    let body = json_body(get(&harness.router, LOGIN_API_PATH, None).await?).await?;
    assert_eq!(body["setup_required"], Value::Bool(true));

    post_pin(&harness.router, "1234").await?;

    let body = json_body(get(&harness.router, LOGIN_API_PATH, None).await?).await?;
    assert_eq!(body["setup_required"], Value::Bool(false));
    Ok(())
}

#[tokio::test]
async fn production_cookie_is_secure() -> Result<()> {
    let harness = harness(Environment::Production)?;
    let response = post_pin(&harness.router, "1234").await?;
    let cookie = set_cookie(&response).context("session cookie")?;
    assert!(cookie.ends_with("; Secure"));
    Ok(())
}

#[tokio::test]
async fn gate_redirects_protected_paths_without_session() -> Result<()> {
    let harness = harness(Environment::Development)?;

    let response = get(&harness.router, "/", None).await?;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), Some(LOGIN_PATH));

    let response = get(&harness.router, "/", Some("session=not-a-token")).await?;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), Some(LOGIN_PATH));
    Ok(())
}

#[tokio::test]
async fn gate_admits_session_from_login() -> Result<()> {
    let harness = harness(Environment::Development)?;

    let response = post_pin(&harness.router, "1234").await?;
    let cookie = cookie_pair(&set_cookie(&response).context("session cookie")?)?;

    let response = get(&harness.router, "/", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    let subject = body["subject"].as_str().context("subject")?;
    let stored = harness.store.find_one().await?.context("credential")?;
    assert_eq!(subject, stored.id.to_string());
    Ok(())
}

#[tokio::test]
async fn gate_rejects_expired_and_tampered_sessions() -> Result<()> {
    let harness = harness(Environment::Development)?;

    let expired = harness.sessions.issue_at(
        "cred-1",
        get_current_timestamp() - DEFAULT_SESSION_TTL_SECONDS - 1,
    )?;
    let response = get(&harness.router, "/", Some(&format!("session={expired}"))).await?;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), Some(LOGIN_PATH));

    let valid = harness.sessions.issue("cred-1")?;
    let (payload_end, _) = valid.rsplit_once('.').context("jwt has a signature")?;
    let forged = format!("{payload_end}.AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");
    let response = get(&harness.router, "/", Some(&format!("session={forged}"))).await?;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    Ok(())
}

#[tokio::test]
async fn authenticated_visit_to_login_redirects_home() -> Result<()> {
    let harness = harness(Environment::Development)?;
    let token = harness.sessions.issue("cred-1")?;
    let cookie = format!("session={token}");

    let response = get(&harness.router, LOGIN_PATH, Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), Some("/"));

    let response = get(&harness.router, LOGIN_API_PATH, Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), Some("/"));
    Ok(())
}

#[tokio::test]
async fn login_page_and_health_are_reachable_anonymously() -> Result<()> {
    let harness = harness(Environment::Development)?;

    let response = get(&harness.router, LOGIN_PATH, None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await?.to_bytes();
    assert!(String::from_utf8_lossy(&bytes).contains("<form"));

    let response = get(&harness.router, "/health", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("X-App"));
    assert!(response.headers().contains_key("x-request-id"));
    let body = json_body(response).await?;
    assert_eq!(body["database"], "ok");
    Ok(())
}
