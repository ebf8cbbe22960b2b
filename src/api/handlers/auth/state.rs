//! Auth state and configuration shared by the login endpoint and the gate.

use std::{fmt, str::FromStr, sync::Arc};

use super::{
    error::ConfigError, hasher::CredentialHasher, session::SessionKeys,
    session::DEFAULT_SESSION_TTL_SECONDS, storage::CredentialStore,
};

pub const LOGIN_PATH: &str = "/login";
pub const LOGIN_API_PATH: &str = "/api/auth/login";
pub const ROOT_PATH: &str = "/";

/// Deployment flavour; production hardens cookies and secrets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

impl Environment {
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            other => Err(ConfigError::UnknownEnvironment(other.to_string())),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    environment: Environment,
    session_ttl_seconds: u64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> u64 {
        self.session_ttl_seconds
    }

    /// Only production serves cookies with the `Secure` attribute.
    pub(super) fn session_cookie_secure(&self) -> bool {
        self.environment.is_production()
    }
}

pub struct AuthState {
    config: AuthConfig,
    sessions: Arc<SessionKeys>,
    hasher: CredentialHasher,
    store: Arc<dyn CredentialStore>,
}

impl AuthState {
    pub fn new(
        config: AuthConfig,
        sessions: Arc<SessionKeys>,
        hasher: CredentialHasher,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            config,
            sessions,
            hasher,
            store,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionKeys> {
        &self.sessions
    }

    pub(super) fn hasher(&self) -> &CredentialHasher {
        &self.hasher
    }

    pub(crate) fn store(&self) -> &dyn CredentialStore {
        self.store.as_ref()
    }
}
