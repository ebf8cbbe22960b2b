//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to an action, rejecting configurations that
//! must not start (production without a database).

use crate::api::handlers::auth::ConfigError;
use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, ARG_DSN, ARG_PORT};
use anyhow::{anyhow, Context, Result};
use url::Url;

fn parse_dsn(dsn: &str) -> Result<String> {
    let parsed = Url::parse(dsn).context("invalid PINGATE_DSN")?;
    match parsed.scheme() {
        "postgres" | "postgresql" => Ok(dsn.to_string()),
        other => Err(anyhow!(
            "unsupported DSN scheme '{other}', expected postgres or postgresql"
        )),
    }
}

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let auth_opts = auth::Options::parse(matches)?;

    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
        .map(parse_dsn)
        .transpose()?;

    if dsn.is_none() && auth_opts.environment.is_production() {
        return Err(ConfigError::MissingDsn.into());
    }

    Ok(Action::Server(Args {
        port,
        dsn,
        environment: auth_opts.environment,
        session_secret: auth_opts.session_secret,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
    }))
}
