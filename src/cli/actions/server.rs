use crate::api::{
    self,
    handlers::auth::{resolve_signing_secret, AuthConfig, Environment, SessionKeys},
};
use anyhow::Result;
use secrecy::SecretString;
use std::{fmt::Write as _, sync::Arc};
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub environment: Environment,
    pub session_secret: Option<SecretString>,
    pub session_ttl_seconds: u64,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is rejected, the database is
/// unreachable, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let secret = resolve_signing_secret(args.session_secret, args.environment)?;
    let sessions = Arc::new(SessionKeys::new(&secret, args.session_ttl_seconds));
    drop(secret);

    let auth_config =
        AuthConfig::new(args.environment).with_session_ttl_seconds(args.session_ttl_seconds);

    api::new(args.port, args.dsn, auth_config, sessions).await?;

    crate::cli::telemetry::shutdown_tracer();

    Ok(())
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        (
            "dsn",
            args.dsn
                .as_deref()
                .map_or_else(|| "none (in-memory store)".to_string(), redact_dsn),
        ),
        ("environment", args.environment.to_string()),
        ("session_secret_set", args.session_secret.is_some().to_string()),
        ("session_ttl_seconds", args.session_ttl_seconds.to_string()),
    ];
    log_entries("Startup configuration", &entries);
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\n{title}:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ = write!(message, "\n  {key}:{padding} {value}");
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
