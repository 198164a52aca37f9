use chrono::Utc;
use reqwest::Client;
use tokio_rusqlite::Connection;

use crate::auth::StoredToken;
use crate::auth::tokens::ensure_fresh_token;
use crate::calendar::CalendarService;
use crate::core::AppConfig;
use crate::core::retry::RetryPolicy;

/// Shared by every request. Nothing in here is mutated after startup.
pub struct AppState {
    pub db: Connection,
    pub config: AppConfig,
    pub http: Client,
    pub retry: RetryPolicy,
}

impl AppState {
    pub fn new(db: Connection, config: AppConfig) -> Self {
        Self {
            db,
            config,
            http: Client::new(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn calendar_service(&self) -> CalendarService {
        CalendarService::new(self.db.clone(), self.config.clone(), self.http.clone())
            .with_retry_policy(self.retry.clone())
    }

    /// The user's Google tokens, refreshed if they are about to expire.
    /// Storage errors are logged and treated as having no tokens.
    pub async fn fresh_token(&self, user_id: &str) -> Option<StoredToken> {
        match ensure_fresh_token(&self.db, &self.http, &self.config, user_id, Utc::now()).await {
            Ok(token) => token,
            Err(e) => {
                tracing::error!(user_id, error = %e, "Loading stored tokens failed");
                None
            }
        }
    }
}
