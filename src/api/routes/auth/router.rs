//! Router for Google sign in and sessions

use std::sync::Arc;

use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Router, extract::State, response::Json};
use axum_extra::extract::Query;
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;

use super::public;
use crate::api::current_session;
use crate::api::public::ApiError;
use crate::api::state::AppState;
use crate::auth::session::{
    create_oauth_state, create_session, delete_session, removal_cookie, session_cookie,
    take_oauth_state,
};
use crate::auth::tokens::save_token_grant;
use crate::auth::{Session, SessionUser};
use crate::core::AppConfig;
use crate::core::validation::safe_callback_url;
use crate::google::oauth::{
    UserInfo, authorization_url, exchange_code_for_token, fetch_user_info, has_required_scopes,
};

type SharedState = Arc<AppState>;

pub(crate) const EMAIL_REQUIRED: &str = "SIGNIN_EMAIL_REQUIRED";
pub(crate) const EMAIL_NOT_VERIFIED: &str = "SIGNIN_EMAIL_NOT_VERIFIED";
pub(crate) const MISSING_SCOPES: &str = "SIGNIN_MISSING_SCOPES";
const ACCESS_DENIED: &str = "AccessDenied";
const INVALID_STATE: &str = "OAuthStateInvalid";
const CALLBACK_FAILED: &str = "OAuthCallback";

/// Decide whether a Google profile may sign in. Returns the user's email
/// or the error code to show. Development lets everything but a missing
/// email through with a warning.
pub(crate) fn validate_sign_in(
    config: &AppConfig,
    profile: &UserInfo,
    granted_scope: Option<&str>,
) -> Result<String, &'static str> {
    let Some(email) = profile.email.clone().filter(|e| !e.is_empty()) else {
        return Err(EMAIL_REQUIRED);
    };

    let verified = profile.email_verified.unwrap_or(false);
    let failure = if !verified && config.is_production() {
        Some(EMAIL_NOT_VERIFIED)
    } else if !has_required_scopes(granted_scope.unwrap_or_default()) {
        Some(MISSING_SCOPES)
    } else {
        None
    };

    match failure {
        None => Ok(email),
        Some(code) if config.is_development() => {
            tracing::warn!(%email, code, "Allowing sign in despite validation failure in development");
            Ok(email)
        }
        Some(code) => Err(code),
    }
}

fn error_redirect(code: &str) -> Response {
    Redirect::to(&format!("/auth/error?error={}", urlencoding::encode(code))).into_response()
}

async fn signin_handler(
    State(state): State<SharedState>,
    Query(params): Query<public::SignInQuery>,
) -> Result<Redirect, ApiError> {
    let callback = safe_callback_url(&state.config.app_url, params.callback_url.as_deref());
    let oauth_state = create_oauth_state(&state.db, &callback, Utc::now()).await?;
    Ok(Redirect::to(&authorization_url(&state.config, &oauth_state)))
}

/// Everything between Google redirecting back and having a session.
/// Errors are the code shown on the error page.
async fn complete_sign_in(
    state: &AppState,
    params: public::CallbackQuery,
) -> Result<(Session, String), &'static str> {
    if let Some(error) = params.error {
        tracing::warn!(%error, "Google sign in was not granted");
        return Err(ACCESS_DENIED);
    }

    let oauth_state = params.state.ok_or(INVALID_STATE)?;
    let callback = take_oauth_state(&state.db, &oauth_state, Utc::now())
        .await
        .map_err(|e| {
            tracing::error!("Failed to read OAuth state: {}", e);
            CALLBACK_FAILED
        })?
        .ok_or_else(|| {
            tracing::warn!(security_event = true, "Unknown or expired OAuth state");
            INVALID_STATE
        })?;
    let code = params.code.ok_or(CALLBACK_FAILED)?;

    let token = exchange_code_for_token(&state.http, &state.config, &code)
        .await
        .map_err(|e| {
            tracing::error!("Authorization code exchange failed: {}", e);
            CALLBACK_FAILED
        })?;
    let profile = fetch_user_info(&state.http, &state.config, &token.access_token)
        .await
        .map_err(|e| {
            tracing::error!("Fetching Google profile failed: {}", e);
            CALLBACK_FAILED
        })?;

    let email = validate_sign_in(&state.config, &profile, token.scope.as_deref()).inspect_err(|code| {
        tracing::warn!(code, email = profile.email.as_deref().unwrap_or_default(), "Sign in rejected");
    })?;

    let now = Utc::now();
    save_token_grant(&state.db, &email, &token, now)
        .await
        .map_err(|e| {
            tracing::error!(%email, "Saving tokens failed: {}", e);
            CALLBACK_FAILED
        })?;

    let user = SessionUser {
        id: email.clone(),
        email: email.clone(),
        name: profile.name,
        image: profile.picture,
    };
    let session = create_session(&state.db, &user, now).await.map_err(|e| {
        tracing::error!(%email, "Creating session failed: {}", e);
        CALLBACK_FAILED
    })?;

    tracing::info!(
        %email,
        verified = profile.email_verified.unwrap_or(false),
        scope = token.scope.as_deref().unwrap_or_default(),
        "Signed in"
    );
    Ok((session, callback))
}

async fn callback_handler(
    State(state): State<SharedState>,
    jar: CookieJar,
    Query(params): Query<public::CallbackQuery>,
) -> Response {
    match complete_sign_in(&state, params).await {
        Ok((session, callback)) => {
            let jar = jar.add(session_cookie(&state.config, &session));
            (jar, Redirect::to(&callback)).into_response()
        }
        Err(code) => error_redirect(code),
    }
}

async fn session_handler(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<Json<Option<public::SessionResponse>>, ApiError> {
    let Some(session) = current_session(&state, &jar).await? else {
        return Ok(Json(None));
    };

    let token = state.fresh_token(&session.user.id).await;
    let (error, error_description) = token
        .map(|t| (t.error, t.error_description))
        .unwrap_or_default();

    Ok(Json(Some(public::SessionResponse {
        user: session.user,
        expires: session.expires_at,
        error,
        error_description,
    })))
}

async fn signout_handler(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<public::SignOutResponse>), ApiError> {
    if let Some(session) = current_session(&state, &jar).await? {
        delete_session(&state.db, &session.id).await?;
        tracing::info!(email = %session.user.email, "Signed out");
    }

    Ok((
        jar.remove(removal_cookie(&state.config)),
        Json(public::SignOutResponse { success: true }),
    ))
}

/// Create the auth router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/signin", get(signin_handler))
        .route("/callback/google", get(callback_handler))
        .route("/session", get(session_handler))
        .route("/signout", post(signout_handler))
}
