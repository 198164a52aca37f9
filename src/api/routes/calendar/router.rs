//! Router for the calendar API

use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use axum::body::Bytes;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Router, extract::State, response::Json};
use axum_extra::extract::Query;
use http::header;

use super::public;
use crate::api::CurrentUser;
use crate::api::public::ApiError;
use crate::api::state::AppState;
use crate::composio::ComposioClient;
use crate::core::validation::is_valid_url;

type SharedState = Arc<AppState>;

const CACHE_PUBLIC: &str = "public, max-age=300";
const CACHE_BYPASS: &str = "no-cache, no-store, must-revalidate";

async fn calendar_handler(
    State(state): State<SharedState>,
    CurrentUser(session): CurrentUser,
    Query(params): Query<public::CalendarQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let started = Instant::now();
    let user_id = session.user.id;
    let force_refresh = params.refresh.as_deref() == Some("true");
    tracing::info!(%user_id, method = "GET", path = "/api/calendar", force_refresh, "API_REQUEST");

    let token = state.fresh_token(&user_id).await;
    let access_token = token.as_ref().and_then(|t| t.usable_access_token());

    let data = state
        .calendar_service()
        .get_calendar_data(&user_id, force_refresh, access_token)
        .await;

    tracing::info!(
        %user_id,
        method = "GET",
        path = "/api/calendar",
        duration_ms = started.elapsed().as_millis() as u64,
        upcoming = data.upcoming_meetings.len(),
        past = data.past_meetings.len(),
        "API_REQUEST"
    );

    let cache_control = if force_refresh { CACHE_BYPASS } else { CACHE_PUBLIC };
    Ok(([(header::CACHE_CONTROL, cache_control)], Json(data)))
}

async fn connect_handler(
    State(state): State<SharedState>,
    CurrentUser(session): CurrentUser,
    body: Bytes,
) -> Result<Json<public::ConnectResponse>, ApiError> {
    let started = Instant::now();
    let user_id = session.user.id;
    let app_url = &state.config.app_url;
    tracing::info!(%user_id, method = "POST", path = "/api/calendar/connect", "API_REQUEST");

    // A missing or unparseable body is the same as not asking for a
    // specific redirect
    let requested = serde_json::from_slice::<public::ConnectRequest>(&body).unwrap_or_default();
    let redirect_url = requested
        .redirect_url
        .filter(|url| is_valid_url(url))
        .unwrap_or_else(|| format!("{}/dashboard", app_url));

    let connection_url = match ComposioClient::from_config(state.http.clone(), &state.config) {
        Some(client) => client
            .with_retry_policy(state.retry.clone())
            .initiate_connection(&user_id, &redirect_url)
            .await
            .map_err(|e| {
                tracing::error!(%user_id, error = %e, "Initiating calendar connection failed");
                ApiError::Internal(anyhow!("Failed to initiate calendar connection"))
            })?,
        None => format!(
            "{}/api/auth/signin?callbackUrl={}",
            app_url,
            urlencoding::encode(&redirect_url)
        ),
    };

    tracing::info!(
        %user_id,
        method = "POST",
        path = "/api/calendar/connect",
        duration_ms = started.elapsed().as_millis() as u64,
        "Calendar connection initiated"
    );

    Ok(Json(public::ConnectResponse {
        redirect_url: connection_url.clone(),
        connection_url,
    }))
}

async fn status_handler(
    State(state): State<SharedState>,
    CurrentUser(session): CurrentUser,
) -> Result<Json<public::StatusResponse>, ApiError> {
    let token = state.fresh_token(&session.user.id).await;
    let connected = match token.as_ref().and_then(|t| t.usable_access_token()) {
        Some(access_token) => state.calendar_service().check_connection(access_token).await,
        None => false,
    };
    Ok(Json(public::StatusResponse { connected }))
}

/// Create the calendar router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(calendar_handler))
        .route("/connect", post(connect_handler))
        .route("/status", get(status_handler))
}
