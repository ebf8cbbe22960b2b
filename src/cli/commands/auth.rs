use crate::api::handlers::auth::{Environment, DEFAULT_SESSION_TTL_SECONDS};
use clap::{builder::ValueParser, Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_ENVIRONMENT: &str = "environment";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";

#[derive(Debug)]
pub struct Options {
    pub session_secret: Option<SecretString>,
    pub environment: Environment,
    pub session_ttl_seconds: u64,
}

impl Options {
    /// Parse session arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a defaulted argument is missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let environment = matches
            .get_one::<Environment>(ARG_ENVIRONMENT)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_ENVIRONMENT}"))?;

        let session_ttl_seconds = matches
            .get_one::<u64>(ARG_SESSION_TTL_SECONDS)
            .copied()
            .unwrap_or(DEFAULT_SESSION_TTL_SECONDS);

        let session_secret = matches
            .get_one::<String>(ARG_SESSION_SECRET)
            .filter(|v| !v.is_empty())
            .map(|v| SecretString::from(v.clone()));

        Ok(Self {
            session_secret,
            environment,
            session_ttl_seconds,
        })
    }
}

fn validator_environment() -> ValueParser {
    ValueParser::from(|value: &str| -> std::result::Result<Environment, String> {
        value.parse::<Environment>().map_err(|err| err.to_string())
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("Secret used to sign session tokens (at least 32 bytes in production)")
                .env("PINGATE_SESSION_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_ENVIRONMENT)
                .short('e')
                .long(ARG_ENVIRONMENT)
                .help("Deployment environment: production or development")
                .env("PINGATE_ENVIRONMENT")
                .default_value("production")
                .value_parser(validator_environment()),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie TTL in seconds")
                .env("PINGATE_SESSION_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
