pub mod health;
pub mod users;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::app::AppState;

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/users", users_router())
}

fn users_router() -> Router<Arc<AppState>> {
    Router::new()
        // Registration helpers
        .route("/check-username/:username", get(users::check_username))
        .route("/check-password", post(users::check_password))
        .route("/verify-password", post(users::verify_password))
        // Profiles
        .route("/register", post(users::register))
        .route("/:username", put(users::update_profile))
}
