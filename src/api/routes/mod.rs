//! API routes module

pub mod auth;
pub mod calendar;
pub mod meetings;

use std::sync::Arc;

use crate::api::state::AppState;
use axum::Router;

type SharedState = Arc<AppState>;

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    Router::new()
        // Sign in, OAuth callback and session routes
        .nest("/auth", auth::router())
        // Calendar routes
        .nest("/calendar", calendar::router())
        // Meeting summary routes
        .nest("/meetings", meetings::router())
}
