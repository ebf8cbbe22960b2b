use crate::api::handlers::{
    auth::{
        self, auth_gate, AuthConfig, AuthGate, AuthState, CredentialHasher, CredentialStore,
        MemoryCredentialStore, PgCredentialStore, SessionKeys, LOGIN_API_PATH, LOGIN_PATH,
    },
    health, root,
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::get,
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, warn, Span};
use ulid::Ulid;

pub mod handlers;
mod openapi;

pub use openapi::openapi;

/// Build the application router: auth routes, the protected dashboard and the
/// session gate in front of all of them.
pub fn app(auth_state: Arc<AuthState>, gate: Arc<AuthGate>) -> Router {
    Router::new()
        .route("/", get(root::root))
        .route("/health", get(health::health))
        .route(LOGIN_PATH, get(auth::login::login_page))
        .route(
            LOGIN_API_PATH,
            get(auth::login::login_status).post(auth::login::login),
        )
        .layer(middleware::from_fn_with_state(gate, auth_gate))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(auth_state)),
        )
}

/// Open the credential store: PostgreSQL when a DSN is given, in-memory otherwise.
///
/// # Errors
/// Returns an error if the database is unreachable or the schema cannot be applied.
pub async fn credential_store(dsn: Option<&str>) -> Result<Arc<dyn CredentialStore>> {
    let Some(dsn) = dsn else {
        warn!("No DSN configured, the admin credential lives in memory only");
        return Ok(Arc::new(MemoryCredentialStore::new()));
    };

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn)
        .await
        .context("Failed to connect to database")?;

    let store = PgCredentialStore::new(pool);
    store
        .migrate()
        .await
        .context("Failed to apply credential schema")?;

    Ok(Arc::new(store))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    dsn: Option<String>,
    auth_config: AuthConfig,
    sessions: Arc<SessionKeys>,
) -> Result<()> {
    let store = credential_store(dsn.as_deref()).await?;
    let hasher = CredentialHasher::new().map_err(|err| anyhow!("Invalid hasher params: {err}"))?;

    let gate = Arc::new(AuthGate::builder(Arc::clone(&sessions)).build());
    let auth_state = Arc::new(AuthState::new(auth_config, sessions, hasher, store));

    info!(
        environment = %auth_state.config().environment(),
        session_ttl_seconds = auth_state.config().session_ttl_seconds(),
        "Auth configured"
    );

    let app = app(auth_state, gate);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", err);
                std::future::pending::<()>().await;
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
