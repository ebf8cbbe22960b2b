//! Request gate enforcing a valid session on every protected path.
//!
//! The gate is built once at startup and evaluates an ordered chain for each
//! request: exempt path, public path, cookie extraction, token verification.
//! It knows nothing about routing; `auth_gate` adapts it to axum middleware.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::debug;

use super::{
    session::{extract_session_token, SessionClaims, SessionKeys},
    state::{LOGIN_API_PATH, LOGIN_PATH, ROOT_PATH},
};

const DEFAULT_EXEMPT_PATHS: &[&str] = &["/health", "/favicon.ico"];

/// Verified session attached to requests that pass the gate on protected paths.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedSession {
    pub subject: String,
    pub issued_at: u64,
    pub expires_at: u64,
}

impl From<SessionClaims> for AuthenticatedSession {
    fn from(claims: SessionClaims) -> Self {
        Self {
            subject: claims.sub,
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateDecision {
    /// Exempt path, or public path without a valid session.
    Pass,
    /// Protected path with a valid session.
    Authenticated(AuthenticatedSession),
    RedirectToLogin,
    /// Public path visited with a valid session.
    RedirectToRoot,
}

#[derive(Debug)]
pub struct AuthGate {
    exempt_paths: Vec<String>,
    public_paths: Vec<String>,
    login_path: String,
    root_path: String,
    sessions: Arc<SessionKeys>,
}

pub struct AuthGateBuilder {
    exempt_paths: Vec<String>,
    public_paths: Vec<String>,
    login_path: String,
    root_path: String,
    sessions: Arc<SessionKeys>,
}

impl AuthGateBuilder {
    #[must_use]
    pub fn public_path(mut self, path: &str) -> Self {
        self.public_paths.push(path.to_string());
        self
    }

    #[must_use]
    pub fn exempt_path(mut self, path: &str) -> Self {
        self.exempt_paths.push(path.to_string());
        self
    }

    #[must_use]
    pub fn login_path(mut self, path: &str) -> Self {
        self.login_path = path.to_string();
        self
    }

    #[must_use]
    pub fn root_path(mut self, path: &str) -> Self {
        self.root_path = path.to_string();
        self
    }

    #[must_use]
    pub fn build(self) -> AuthGate {
        AuthGate {
            exempt_paths: self.exempt_paths,
            public_paths: self.public_paths,
            login_path: self.login_path,
            root_path: self.root_path,
            sessions: self.sessions,
        }
    }
}

/// `prefix` matches itself and anything below it, but not `prefix` + suffix.
fn path_matches(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

impl AuthGate {
    /// Builder preloaded with the login page and login endpoint as public paths.
    #[must_use]
    pub fn builder(sessions: Arc<SessionKeys>) -> AuthGateBuilder {
        AuthGateBuilder {
            exempt_paths: DEFAULT_EXEMPT_PATHS.iter().map(ToString::to_string).collect(),
            public_paths: vec![LOGIN_PATH.to_string(), LOGIN_API_PATH.to_string()],
            login_path: LOGIN_PATH.to_string(),
            root_path: ROOT_PATH.to_string(),
            sessions,
        }
    }

    fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths.iter().any(|p| path_matches(path, p))
    }

    fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| path_matches(path, p))
    }

    fn session(&self, headers: &HeaderMap) -> Option<SessionClaims> {
        let token = extract_session_token(headers)?;
        self.sessions.verify(&token)
    }

    #[must_use]
    pub fn decide(&self, path: &str, headers: &HeaderMap) -> GateDecision {
        if self.is_exempt(path) {
            return GateDecision::Pass;
        }

        let public = self.is_public(path);
        match (public, self.session(headers)) {
            (true, Some(_)) => GateDecision::RedirectToRoot,
            (true, None) => GateDecision::Pass,
            (false, Some(claims)) => GateDecision::Authenticated(claims.into()),
            (false, None) => GateDecision::RedirectToLogin,
        }
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn root_path(&self) -> &str {
        &self.root_path
    }
}

/// axum middleware applying the gate to every request.
pub async fn auth_gate(
    State(gate): State<Arc<AuthGate>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let decision = gate.decide(request.uri().path(), request.headers());
    match decision {
        GateDecision::Pass => next.run(request).await,
        GateDecision::Authenticated(session) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        GateDecision::RedirectToLogin => {
            debug!("No valid session for {}, redirecting to login", request.uri().path());
            Redirect::temporary(gate.login_path()).into_response()
        }
        GateDecision::RedirectToRoot => Redirect::temporary(gate.root_path()).into_response(),
    }
}
