//! PIN login endpoint and the setup-or-login decision.
//!
//! Flow Overview:
//! 1) Reject PINs shorter than `MIN_PIN_LENGTH` before touching the store.
//! 2) No credential yet (setup mode): hash the PIN and `create_if_absent`.
//!    Losing that race to a concurrent submission falls through to a normal
//!    login against the winning credential.
//! 3) Credential present: verify the PIN against the stored hash.
//! 4) On success issue a session token and set the `session` cookie.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    error::{LoginError, StoreError, MSG_PIN_TOO_SHORT},
    hasher::CredentialHasher,
    session::session_cookie,
    state::AuthState,
    storage::CreateOutcome,
    types::{ErrorResponse, LoginRequest, LoginResponse, LoginStatusResponse},
};

pub const MIN_PIN_LENGTH: usize = 4;

const LOGIN_PAGE: &str = include_str!("login.html");

/// Result of an accepted PIN.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoginOutcome {
    pub credential_id: Uuid,
    /// `true` when this submission created the admin credential.
    pub setup: bool,
}

fn validate_pin(pin: &str) -> Result<(), LoginError> {
    if pin.chars().count() < MIN_PIN_LENGTH {
        return Err(LoginError::Validation(MSG_PIN_TOO_SHORT.to_string()));
    }
    Ok(())
}

async fn hash_pin(hasher: &CredentialHasher, pin: &str) -> Result<String, LoginError> {
    let hasher = hasher.clone();
    let pin = pin.to_string();
    tokio::task::spawn_blocking(move || hasher.hash(&pin))
        .await
        .map_err(|err| LoginError::Internal(format!("hash task failed: {err}")))?
        .map_err(|err| LoginError::Internal(format!("failed to hash PIN: {err}")))
}

async fn verify_pin(hasher: &CredentialHasher, pin: &str, hashed: &str) -> Result<bool, LoginError> {
    let hasher = hasher.clone();
    let pin = pin.to_string();
    let hashed = hashed.to_string();
    tokio::task::spawn_blocking(move || hasher.verify(&pin, &hashed))
        .await
        .map_err(|err| LoginError::Internal(format!("verify task failed: {err}")))
}

/// Decide between setup and login for a submitted PIN.
///
/// # Errors
/// `Validation` for short PINs, `InvalidPin` on mismatch, `Storage` when the
/// credential store fails.
pub async fn authenticate(auth_state: &AuthState, pin: &str) -> Result<LoginOutcome, LoginError> {
    validate_pin(pin)?;

    let store = auth_state.store();
    let credential = match store.find_one().await? {
        Some(credential) => credential,
        None => {
            let pin_hash = hash_pin(auth_state.hasher(), pin).await?;
            match store.create_if_absent(&pin_hash).await? {
                CreateOutcome::Created(credential) => {
                    info!(credential_id = %credential.id, "Admin credential created");
                    return Ok(LoginOutcome {
                        credential_id: credential.id,
                        setup: true,
                    });
                }
                CreateOutcome::Conflict => {
                    debug!("Setup lost a race, verifying against the stored credential");
                    store.find_one().await?.ok_or_else(|| {
                        StoreError::Inconsistent(
                            "create reported a conflict but no credential exists".to_string(),
                        )
                    })?
                }
            }
        }
    };

    if verify_pin(auth_state.hasher(), pin, &credential.pin_hash).await? {
        Ok(LoginOutcome {
            credential_id: credential.id,
            setup: false,
        })
    } else {
        warn!("Rejected login with invalid PIN");
        Err(LoginError::InvalidPin)
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Setup or login succeeded, session cookie set", body = LoginResponse),
        (status = 400, description = "PIN shorter than 4 characters", body = ErrorResponse),
        (status = 401, description = "Invalid PIN", body = ErrorResponse),
        (status = 500, description = "Credential store failure", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return LoginError::Validation(MSG_PIN_TOO_SHORT.to_string()).into_response(),
    };

    let outcome = match authenticate(&auth_state, &request.pin).await {
        Ok(outcome) => outcome,
        Err(err) => return err.into_response(),
    };

    match session_response(&auth_state, outcome) {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

fn session_response(auth_state: &AuthState, outcome: LoginOutcome) -> Result<Response, LoginError> {
    let token = auth_state
        .sessions()
        .issue(&outcome.credential_id.to_string())
        .map_err(|err| LoginError::Internal(format!("failed to sign session: {err}")))?;

    let cookie = session_cookie(
        &token,
        auth_state.sessions().ttl_seconds(),
        auth_state.config().session_cookie_secure(),
    )
    .map_err(|err| LoginError::Internal(format!("failed to build session cookie: {err}")))?;

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);

    let message = if outcome.setup {
        "Setup successful"
    } else {
        "Login successful"
    };
    let body = LoginResponse {
        message: message.to_string(),
        setup: outcome.setup,
    };
    Ok((StatusCode::OK, headers, Json(body)).into_response())
}

#[utoipa::path(
    get,
    path = "/api/auth/login",
    responses(
        (status = 200, description = "Whether the next PIN creates the admin credential", body = LoginStatusResponse),
        (status = 500, description = "Credential store failure", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login_status(auth_state: Extension<Arc<AuthState>>) -> Response {
    match auth_state.store().count().await {
        Ok(count) => {
            let body = LoginStatusResponse {
                setup_required: count == 0,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err) => LoginError::Storage(err).into_response(),
    }
}

// Static page; authenticated visitors never reach it, the gate sends them to `/`.
pub async fn login_page() -> Html<&'static str> {
    Html(LOGIN_PAGE)
}
