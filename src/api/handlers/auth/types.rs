//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub pin: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub message: String,
    pub setup: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginStatusResponse {
    pub setup_required: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}
