//! Server side sessions keyed by an opaque cookie, plus the one-time
//! `state` values that protect the OAuth callback.

use anyhow::Result;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rusqlite::OptionalExtension;
use serde::Serialize;
use tokio_rusqlite::Connection;
use uuid::Uuid;

use crate::core::AppConfig;

pub const SESSION_TTL_HOURS: i64 = 24;
pub const OAUTH_STATE_TTL_SECS: i64 = 600;

const SESSION_COOKIE: &str = "session-token";
const SECURE_SESSION_COOKIE: &str = "__Secure-session-token";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionUser {
    /// Users are identified by their Google email address
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: String,
    pub user: SessionUser,
    pub expires_at: DateTime<Utc>,
}

pub fn session_cookie_name(config: &AppConfig) -> &'static str {
    if config.is_production() {
        SECURE_SESSION_COOKIE
    } else {
        SESSION_COOKIE
    }
}

pub fn session_cookie(config: &AppConfig, session: &Session) -> Cookie<'static> {
    Cookie::build((session_cookie_name(config), session.id.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.is_production())
        .max_age(time::Duration::hours(SESSION_TTL_HOURS))
        .build()
}

/// Cookie matching the session cookie's name and path, for removal
pub fn removal_cookie(config: &AppConfig) -> Cookie<'static> {
    Cookie::build((session_cookie_name(config), "")).path("/").build()
}

pub async fn create_session(db: &Connection, user: &SessionUser, now: DateTime<Utc>) -> Result<Session> {
    let session = Session {
        id: Uuid::new_v4().to_string(),
        user: user.clone(),
        expires_at: now + Duration::hours(SESSION_TTL_HOURS),
    };

    let row = session.clone();
    let created_at = now.timestamp();
    db.call(move |conn| {
        conn.execute(
            "INSERT INTO session (id, user_id, name, picture, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                row.id,
                row.user.id,
                row.user.name,
                row.user.image,
                row.expires_at.timestamp(),
                created_at
            ],
        )?;
        Ok(())
    })
    .await?;

    Ok(session)
}

/// Look up an unexpired session
pub async fn find_session(db: &Connection, session_id: &str, now: DateTime<Utc>) -> Result<Option<Session>> {
    let id = session_id.to_string();
    let now_ts = now.timestamp();
    let row = db
        .call(move |conn| {
            let row = conn
                .query_row(
                    "SELECT id, user_id, name, picture, expires_at FROM session
                     WHERE id = ?1 AND expires_at > ?2",
                    rusqlite::params![id, now_ts],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, Option<String>>(2)?,
                            row.get::<_, Option<String>>(3)?,
                            row.get::<_, i64>(4)?,
                        ))
                    },
                )
                .optional()?;
            Ok(row)
        })
        .await?;

    let Some((id, user_id, name, picture, expires_at)) = row else {
        return Ok(None);
    };
    let expires_at = Utc
        .timestamp_opt(expires_at, 0)
        .single()
        .ok_or_else(|| anyhow::anyhow!("Invalid session expiry {}", expires_at))?;

    Ok(Some(Session {
        id,
        user: SessionUser {
            email: user_id.clone(),
            id: user_id,
            name,
            image: picture,
        },
        expires_at,
    }))
}

pub async fn delete_session(db: &Connection, session_id: &str) -> Result<()> {
    let id = session_id.to_string();
    db.call(move |conn| {
        conn.execute("DELETE FROM session WHERE id = ?1", [&id])?;
        Ok(())
    })
    .await?;
    Ok(())
}

/// Remember where to send the user after sign in and return the
/// random `state` to round trip through Google.
pub async fn create_oauth_state(db: &Connection, callback_url: &str, now: DateTime<Utc>) -> Result<String> {
    let state = Uuid::new_v4().to_string();
    let (row_state, callback) = (state.clone(), callback_url.to_string());
    let created_at = now.timestamp();
    db.call(move |conn| {
        conn.execute(
            "INSERT INTO oauth_state (state, callback_url, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![row_state, callback, created_at],
        )?;
        Ok(())
    })
    .await?;
    Ok(state)
}

/// Consume a `state` value. Returns the stored callback URL when the
/// state exists and hasn't expired, it can only be used once.
pub async fn take_oauth_state(db: &Connection, state: &str, now: DateTime<Utc>) -> Result<Option<String>> {
    let state = state.to_string();
    let cutoff = now.timestamp() - OAUTH_STATE_TTL_SECS;
    let callback = db
        .call(move |conn| {
            let tx = conn.transaction()?;
            let callback = tx
                .query_row(
                    "SELECT callback_url FROM oauth_state WHERE state = ?1 AND created_at > ?2",
                    rusqlite::params![state, cutoff],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            tx.execute("DELETE FROM oauth_state WHERE state = ?1", [&state])?;
            tx.commit()?;
            Ok(callback)
        })
        .await?;
    Ok(callback)
}

/// Delete expired sessions and stale OAuth states. Returns how many of
/// each were removed.
pub async fn purge_expired(db: &Connection, now: DateTime<Utc>) -> Result<(usize, usize)> {
    let now_ts = now.timestamp();
    let cutoff = now_ts - OAUTH_STATE_TTL_SECS;
    let counts = db
        .call(move |conn| {
            let sessions = conn.execute("DELETE FROM session WHERE expires_at <= ?1", [now_ts])?;
            let states = conn.execute("DELETE FROM oauth_state WHERE created_at <= ?1", [cutoff])?;
            Ok((sessions, states))
        })
        .await?;
    Ok(counts)
}
