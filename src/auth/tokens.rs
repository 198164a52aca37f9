//! Stored Google tokens per user and the refresh lifecycle.
//!
//! An access token is refreshed once it is within `REFRESH_WINDOW_SECS`
//! of expiring. When that isn't possible the connection is flagged with
//! an error code so the UI can ask the user to sign in again.

use anyhow::Result;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use crate::core::AppConfig;
use crate::google::oauth::{OAuthError, OAuthToken, refresh_access_token};

pub const REFRESH_WINDOW_SECS: i64 = 60;
/// Lifetime assumed when the token endpoint omits `expires_in`
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

pub const NO_REFRESH_TOKEN: &str = "NO_REFRESH_TOKEN";
pub const REFRESH_TOKEN_ERROR: &str = "REFRESH_TOKEN_ERROR";

#[derive(Debug, Clone, PartialEq)]
pub struct StoredToken {
    pub user_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Unix seconds
    pub expires_at: Option<i64>,
    pub scope: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl StoredToken {
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at - now.timestamp() <= REFRESH_WINDOW_SECS)
    }

    /// The access token, unless the connection is in an error state
    pub fn usable_access_token(&self) -> Option<&str> {
        if self.error.is_some() {
            return None;
        }
        self.access_token.as_deref()
    }
}

fn expires_at(token: &OAuthToken, now: DateTime<Utc>) -> i64 {
    now.timestamp() + token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS)
}

/// Store the tokens from a sign in. A missing refresh token keeps the
/// one already on file.
pub async fn save_token_grant(
    db: &Connection,
    user_id: &str,
    token: &OAuthToken,
    now: DateTime<Utc>,
) -> Result<()> {
    let user = user_id.to_string();
    let token = token.clone();
    let expires = expires_at(&token, now);
    let updated_at = now.timestamp();

    db.call(move |conn| {
        conn.execute(
            "INSERT INTO user_calendar_connections
             (user_id, provider, access_token, refresh_token, expires_at, scope, error, error_description, updated_at)
             VALUES (?1, 'google', ?2, ?3, ?4, ?5, NULL, NULL, ?6)
             ON CONFLICT(user_id) DO UPDATE SET
               access_token = excluded.access_token,
               refresh_token = COALESCE(excluded.refresh_token, user_calendar_connections.refresh_token),
               expires_at = excluded.expires_at,
               scope = COALESCE(excluded.scope, user_calendar_connections.scope),
               error = NULL,
               error_description = NULL,
               updated_at = excluded.updated_at",
            rusqlite::params![
                user,
                token.access_token,
                token.refresh_token,
                expires,
                token.scope,
                updated_at
            ],
        )?;
        Ok(())
    })
    .await?;

    Ok(())
}

pub async fn find_token(db: &Connection, user_id: &str) -> Result<Option<StoredToken>> {
    let user = user_id.to_string();
    let token = db
        .call(move |conn| {
            let token = conn
                .query_row(
                    "SELECT user_id, access_token, refresh_token, expires_at, scope, error, error_description
                     FROM user_calendar_connections WHERE user_id = ?1",
                    [&user],
                    |row| {
                        Ok(StoredToken {
                            user_id: row.get(0)?,
                            access_token: row.get(1)?,
                            refresh_token: row.get(2)?,
                            expires_at: row.get(3)?,
                            scope: row.get(4)?,
                            error: row.get(5)?,
                            error_description: row.get(6)?,
                        })
                    },
                )
                .optional()?;
            Ok(token)
        })
        .await?;
    Ok(token)
}

async fn set_token_error(
    db: &Connection,
    user_id: &str,
    error: &str,
    description: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let (user, error, description) = (user_id.to_string(), error.to_string(), description.to_string());
    let updated_at = now.timestamp();
    db.call(move |conn| {
        conn.execute(
            "UPDATE user_calendar_connections
             SET error = ?2, error_description = ?3, updated_at = ?4
             WHERE user_id = ?1",
            rusqlite::params![user, error, description, updated_at],
        )?;
        Ok(())
    })
    .await?;
    Ok(())
}

async fn save_refreshed(
    db: &Connection,
    user_id: &str,
    access_token: &str,
    refresh_token: &str,
    expires_at: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    let (user, access, refresh) = (
        user_id.to_string(),
        access_token.to_string(),
        refresh_token.to_string(),
    );
    let updated_at = now.timestamp();
    db.call(move |conn| {
        conn.execute(
            "UPDATE user_calendar_connections
             SET access_token = ?2, refresh_token = ?3, expires_at = ?4,
                 error = NULL, error_description = NULL, updated_at = ?5
             WHERE user_id = ?1",
            rusqlite::params![user, access, refresh, expires_at, updated_at],
        )?;
        Ok(())
    })
    .await?;
    Ok(())
}

/// Load the user's tokens, refreshing the access token first when it is
/// about to expire. Refresh failures are recorded on the returned token
/// (and in the database) rather than returned as errors.
pub async fn ensure_fresh_token(
    db: &Connection,
    http: &Client,
    config: &AppConfig,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<StoredToken>> {
    let Some(token) = find_token(db, user_id).await? else {
        return Ok(None);
    };
    if !token.needs_refresh(now) {
        return Ok(Some(token));
    }

    let Some(refresh_token) = token.refresh_token.clone() else {
        tracing::warn!(user_id, "Access token expired and no refresh token is stored");
        let description = "No refresh token available";
        set_token_error(db, user_id, NO_REFRESH_TOKEN, description, now).await?;
        return Ok(Some(StoredToken {
            access_token: None,
            error: Some(NO_REFRESH_TOKEN.to_string()),
            error_description: Some(description.to_string()),
            ..token
        }));
    };

    match refresh_access_token(http, config, &refresh_token).await {
        Ok(refreshed) => {
            let refresh_token = refreshed.refresh_token.clone().unwrap_or(refresh_token);
            let expires = expires_at(&refreshed, now);
            save_refreshed(db, user_id, &refreshed.access_token, &refresh_token, expires, now).await?;
            tracing::info!(user_id, "Refreshed Google access token");

            Ok(Some(StoredToken {
                access_token: Some(refreshed.access_token),
                refresh_token: Some(refresh_token),
                expires_at: Some(expires),
                error: None,
                error_description: None,
                ..token
            }))
        }
        Err(e) => {
            let description = match e.downcast_ref::<OAuthError>() {
                Some(oauth) => oauth
                    .error_description
                    .clone()
                    .unwrap_or_else(|| oauth.error.clone()),
                None => e.to_string(),
            };
            tracing::error!(user_id, error = %e, "Refreshing Google access token failed");
            set_token_error(db, user_id, REFRESH_TOKEN_ERROR, &description, now).await?;

            Ok(Some(StoredToken {
                access_token: None,
                error: Some(REFRESH_TOKEN_ERROR.to_string()),
                error_description: Some(description),
                ..token
            }))
        }
    }
}
