//! Auth handlers and supporting modules.
//!
//! This module owns the single admin credential, the PIN login endpoint and the
//! session gate that protects everything else.
//!
//! ## Setup Mode
//!
//! While no credential is stored, the first PIN submitted to
//! `POST /api/auth/login` becomes the admin PIN. Creation goes through
//! `CredentialStore::create_if_absent`, so concurrent first submissions produce
//! exactly one credential and every loser is verified against the winner.
//!
//! ## Sessions
//!
//! Sessions are stateless HS256 tokens carried in the `session` cookie. The
//! signing secret is resolved once at startup; production refuses to start
//! without a secret of at least 32 bytes.
//!
//! > **Note:** There is no server-side revocation. A leaked token stays valid
//! > until it expires, and rotating the secret logs everyone out.

mod error;
pub(crate) mod gate;
mod hasher;
pub(crate) mod login;
pub(crate) mod session;
mod state;
mod storage;
pub(crate) mod types;

pub use error::{ConfigError, LoginError, StoreError};
pub use gate::{auth_gate, AuthGate, AuthenticatedSession, GateDecision};
pub use hasher::CredentialHasher;
pub use login::{authenticate, LoginOutcome, MIN_PIN_LENGTH};
pub use session::{
    resolve_signing_secret, SessionClaims, SessionKeys, DEFAULT_SESSION_TTL_SECONDS,
    MIN_SECRET_BYTES, SESSION_COOKIE_NAME,
};
pub use state::{AuthConfig, AuthState, Environment, LOGIN_API_PATH, LOGIN_PATH, ROOT_PATH};
pub use storage::{
    AdminCredential, CreateOutcome, CredentialStore, MemoryCredentialStore, PgCredentialStore,
};

#[cfg(test)]
mod tests;
