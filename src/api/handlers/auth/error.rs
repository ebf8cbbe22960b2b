//! Error taxonomy for the credential, session and login flow.
//!
//! Handlers never expose internal detail: storage and internal failures are
//! logged server side and collapse to a generic 500 body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use super::types::ErrorResponse;

pub(super) const MSG_PIN_TOO_SHORT: &str = "PIN must be at least 4 digits";
pub(super) const MSG_INVALID_PIN: &str = "Invalid PIN";
pub(super) const MSG_INTERNAL: &str = "Internal server error";

/// Failure reported by a credential store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing database rejected the request or could not be reached.
    #[error("credential store query failed: {0}")]
    Database(#[from] sqlx::Error),

    /// The store returned data that violates the single credential contract.
    #[error("credential store inconsistent: {0}")]
    Inconsistent(String),
}

/// Outcome of a rejected login submission.
#[derive(Debug, Error)]
pub enum LoginError {
    /// PIN missing or shorter than the minimum length.
    #[error("invalid login request: {0}")]
    Validation(String),

    /// PIN did not match the stored credential.
    #[error("invalid PIN")]
    InvalidPin,

    #[error(transparent)]
    Storage(#[from] StoreError),

    /// Hashing or token signing failed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LoginError {
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::InvalidPin => StatusCode::UNAUTHORIZED,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client facing message; never includes storage or internal detail.
    #[must_use]
    pub fn public_message(&self) -> &str {
        match self {
            Self::Validation(message) => message,
            Self::InvalidPin => MSG_INVALID_PIN,
            Self::Storage(_) | Self::Internal(_) => MSG_INTERNAL,
        }
    }
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        match &self {
            Self::Storage(err) => error!("Login failed on credential store: {err}"),
            Self::Internal(err) => error!("Login failed: {err}"),
            Self::Validation(_) | Self::InvalidPin => {}
        }
        let body = ErrorResponse {
            error: self.public_message().to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Startup configuration that must abort the process.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("session secret is required in production (set PINGATE_SESSION_SECRET)")]
    MissingSessionSecret,

    #[error("session secret must be at least {min} bytes in production, got {actual}")]
    WeakSessionSecret { min: usize, actual: usize },

    #[error("a database DSN is required in production (set PINGATE_DSN)")]
    MissingDsn,

    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),
}
