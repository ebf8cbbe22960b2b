//! Stateless session tokens and the cookie that carries them.
//!
//! Tokens are HS256 JWTs signed with a secret resolved once at startup. Nothing
//! is persisted: a token is valid while its signature checks out and `exp` is in
//! the future. Verification is fail-closed and never reports why it failed.

use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};
use jsonwebtoken::{
    decode, encode, get_current_timestamp, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{error::ConfigError, state::Environment};

pub const SESSION_COOKIE_NAME: &str = "session";
pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 24 * 60 * 60;
pub const MIN_SECRET_BYTES: usize = 32;

const SESSION_ALGORITHM: Algorithm = Algorithm::HS256;

/// Claims carried by a session token.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    /// Admin credential id.
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
}

/// Signing and verification keys derived from the process-wide secret.
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_seconds: u64,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("secret", &"***")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

impl SessionKeys {
    #[must_use]
    pub fn new(secret: &SecretString, ttl_seconds: u64) -> Self {
        let bytes = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(SESSION_ALGORITHM);
        validation.set_required_spec_claims(&["sub", "iat", "exp"]);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            validation,
            ttl_seconds,
        }
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Issue a token for the given credential id, valid for the configured TTL.
    ///
    /// # Errors
    /// Returns an error if the token cannot be signed.
    pub fn issue(&self, subject: &str) -> Result<String, jsonwebtoken::errors::Error> {
        self.issue_at(subject, get_current_timestamp())
    }

    pub(crate) fn issue_at(
        &self,
        subject: &str,
        issued_at: u64,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = SessionClaims {
            sub: subject.to_string(),
            iat: issued_at,
            exp: issued_at.saturating_add(self.ttl_seconds),
        };
        encode(&Header::new(SESSION_ALGORITHM), &claims, &self.encoding)
    }

    /// Verify a token, returning its claims or `None` on any failure.
    #[must_use]
    pub fn verify(&self, token: &str) -> Option<SessionClaims> {
        match decode::<SessionClaims>(token, &self.decoding, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(err) => {
                debug!("Session token rejected: {:?}", err.kind());
                None
            }
        }
    }
}

/// Resolve the signing secret for the given environment.
///
/// Production refuses to start without a strong secret. Development falls back
/// to a random per-process secret, so sessions do not survive a restart.
///
/// # Errors
/// Returns a `ConfigError` when production is missing a usable secret.
pub fn resolve_signing_secret(
    configured: Option<SecretString>,
    environment: Environment,
) -> Result<SecretString, ConfigError> {
    let configured = configured.filter(|secret| !secret.expose_secret().is_empty());

    match (configured, environment) {
        (Some(secret), Environment::Production) => {
            let actual = secret.expose_secret().len();
            if actual < MIN_SECRET_BYTES {
                return Err(ConfigError::WeakSessionSecret {
                    min: MIN_SECRET_BYTES,
                    actual,
                });
            }
            Ok(secret)
        }
        (Some(secret), Environment::Development) => Ok(secret),
        (None, Environment::Production) => Err(ConfigError::MissingSessionSecret),
        (None, Environment::Development) => {
            warn!("No session secret configured, using an ephemeral secret for this process");
            Ok(generate_ephemeral_secret())
        }
    }
}

fn generate_ephemeral_secret() -> SecretString {
    let mut bytes = [0u8; MIN_SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    SecretString::from(hex)
}

/// Build the `Set-Cookie` value for a freshly issued session token.
pub(super) fn session_cookie(
    token: &str,
    ttl_seconds: u64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; HttpOnly; SameSite=Strict; Max-Age={ttl_seconds}; Path=/"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Read the session token from the `Cookie` header(s), if present.
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            let val = val.trim();
            (key.trim() == SESSION_COOKIE_NAME && !val.is_empty()).then(|| val.to_string())
        })
}
