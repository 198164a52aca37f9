use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use http::request::Parts;

use super::public::ApiError;
use super::state::AppState;
use crate::auth::Session;
use crate::auth::session::{find_session, session_cookie_name};

/// Session referenced by the request's session cookie, if it exists and
/// hasn't expired
pub async fn current_session(state: &AppState, jar: &CookieJar) -> anyhow::Result<Option<Session>> {
    let Some(cookie) = jar.get(session_cookie_name(&state.config)) else {
        return Ok(None);
    };
    find_session(&state.db, cookie.value(), Utc::now()).await
}

/// Rejects the request with 401 unless it carries a valid session
pub struct CurrentUser(pub Session);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        match current_session(state, &jar).await? {
            Some(session) => Ok(CurrentUser(session)),
            None => {
                tracing::warn!(
                    security_event = true,
                    method = %parts.method,
                    path = %parts.uri.path(),
                    "Unauthorized access attempt"
                );
                Err(ApiError::Unauthorized)
            }
        }
    }
}
