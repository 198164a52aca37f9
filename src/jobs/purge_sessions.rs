use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tokio_rusqlite::Connection;

use super::PeriodicJob;
use crate::auth::session::purge_expired;
use crate::core::AppConfig;

#[derive(Debug)]
pub struct PurgeExpiredSessions;

#[async_trait]
impl PeriodicJob for PurgeExpiredSessions {
    fn interval(&self) -> Duration {
        // Hourly
        Duration::from_secs(60 * 60)
    }

    async fn run_job(&self, _config: &AppConfig, db: &Connection) {
        match purge_expired(db, Utc::now()).await {
            Ok((sessions, states)) => {
                tracing::info!(sessions, states, "Purged expired sessions and OAuth states");
            }
            Err(e) => tracing::error!("Failed to purge expired sessions: {}", e),
        }
    }
}
