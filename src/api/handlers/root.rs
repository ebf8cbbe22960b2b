//! Protected landing endpoint; only reachable with a valid session.

use super::auth::AuthenticatedSession;
use axum::{extract::Extension, response::Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Dashboard {
    pub name: String,
    pub version: String,
    /// Credential id carried by the session.
    pub subject: String,
    pub expires_at: u64,
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Authenticated dashboard summary", body = Dashboard),
        (status = 307, description = "No valid session, redirected to /login")
    ),
    tag = "pingate"
)]
pub async fn root(Extension(session): Extension<AuthenticatedSession>) -> Json<Dashboard> {
    Json(Dashboard {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        subject: session.subject,
        expires_at: session.expires_at,
    })
}
