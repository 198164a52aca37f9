//! Router for meeting summaries

use std::sync::Arc;

use axum::extract::Path;
use axum::routing::get;
use axum::{Router, extract::State, response::Json};
use chrono::Utc;

use super::public;
use crate::api::CurrentUser;
use crate::api::public::ApiError;
use crate::api::state::AppState;
use crate::calendar::cache::find_cached_meeting;
use crate::summary::generate_summary;

type SharedState = Arc<AppState>;

async fn summary_handler(
    State(state): State<SharedState>,
    CurrentUser(session): CurrentUser,
    Path(meeting_id): Path<String>,
) -> Result<Json<public::MockAiSummary>, ApiError> {
    let meeting = find_cached_meeting(&state.db, &session.user.id, &meeting_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Meeting {} not found", meeting_id)))?;

    Ok(Json(generate_summary(&meeting, Utc::now())))
}

/// Create the meetings router
pub fn router() -> Router<SharedState> {
    Router::new().route("/{id}/summary", get(summary_handler))
}
