use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use tokio_rusqlite::Connection;

use crate::core::AppConfig;

mod purge_sessions;
pub use purge_sessions::PurgeExpiredSessions;

#[async_trait]
pub trait PeriodicJob: Debug + Send + Sync + 'static {
    fn interval(&self) -> Duration;

    async fn run_job(&self, config: &AppConfig, db: &Connection);
}

/// Run `job` forever on its own task. The first run happens
/// immediately, then once every `interval`.
pub fn spawn_periodic_job<J: PeriodicJob>(config: AppConfig, db: Connection, job: J) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(job.interval());
        loop {
            ticker.tick().await;
            tracing::debug!("Running periodic job {:?}", job);
            job.run_job(&config, &db).await;
        }
    });
}
