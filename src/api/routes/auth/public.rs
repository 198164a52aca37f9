//! Public types for the sign in API
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::auth::SessionUser;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInQuery {
    pub callback_url: Option<String>,
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by Google when the user denies consent
    pub error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: SessionUser,
    pub expires: DateTime<Utc>,
    /// `NO_REFRESH_TOKEN` or `REFRESH_TOKEN_ERROR` when the user needs
    /// to sign in again
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct SignOutResponse {
    pub success: bool,
}
