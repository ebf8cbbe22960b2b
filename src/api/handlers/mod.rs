//! Route handlers for the gate, the login flow and the protected dashboard.

pub mod auth;
pub mod health;
pub mod root;
