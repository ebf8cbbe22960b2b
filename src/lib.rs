//! # Pingate (single-admin PIN gate)
//!
//! `pingate` guards a private dashboard that has exactly one administrator.
//!
//! ## Setup Mode
//!
//! Until an admin credential exists the service is in setup mode: the first PIN
//! submitted to `POST /api/auth/login` is hashed and stored as the admin PIN.
//! The store creates that record with an atomic create-if-absent, so concurrent
//! first submissions can never produce two credentials.
//!
//! ## Sessions
//!
//! A successful setup or login issues a stateless HS256 JWT in the `session`
//! cookie (`HttpOnly`, `SameSite=Strict`, 24h). Nothing about the session is
//! stored server side; validity is signature plus expiry.
//!
//! ## Gate
//!
//! Every request except `/login` and `/api/auth/login` must carry a valid
//! session cookie or it is redirected to `/login`. Authenticated visitors to
//! the public paths are redirected to `/`.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
