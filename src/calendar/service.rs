use chrono::{DateTime, Utc};
use reqwest::Client;
use tokio_rusqlite::Connection;

use super::cache::{cache_calendar, get_cached_calendar};
use super::models::CalendarData;
use super::sources::{
    ComposioSource, EventSource, FetchedEvents, GoogleApiKeySource, GoogleOAuthSource,
};
use super::transform::transform_events;
use crate::composio::ComposioClient;
use crate::core::AppConfig;
use crate::core::retry::RetryPolicy;
use crate::google::gcal::{Credentials, GoogleCalendarClient};

/// Fetches a user's dashboard calendar through the cache and the
/// configured event sources.
pub struct CalendarService {
    db: Connection,
    config: AppConfig,
    http: Client,
    retry: RetryPolicy,
}

impl CalendarService {
    pub fn new(db: Connection, config: AppConfig, http: Client) -> Self {
        Self {
            db,
            config,
            http,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn google_client(&self, credentials: Credentials) -> GoogleCalendarClient {
        GoogleCalendarClient::new(self.http.clone(), &self.config.google_api_url, credentials)
            .with_retry_policy(self.retry.clone())
    }

    /// Sources in the order they should be tried: the connector service,
    /// the user's own OAuth token, then the public calendar API key.
    pub fn sources(&self, user_id: &str, access_token: Option<&str>) -> Vec<Box<dyn EventSource>> {
        let mut sources: Vec<Box<dyn EventSource>> = vec![];

        if let Some(client) = ComposioClient::from_config(self.http.clone(), &self.config) {
            let client = client.with_retry_policy(self.retry.clone());
            sources.push(Box::new(ComposioSource::new(client, user_id)));
        }

        if let Some(token) = access_token {
            let client = self.google_client(Credentials::AccessToken(token.to_string()));
            sources.push(Box::new(GoogleOAuthSource::new(client)));
        }

        if self.config.enable_api_key_fallback
            && let (Some(key), Some(calendar_id)) =
                (&self.config.google_api_key, &self.config.google_calendar_id)
        {
            let client = self.google_client(Credentials::ApiKey(key.clone()));
            sources.push(Box::new(GoogleApiKeySource::new(client, calendar_id)));
        }

        sources
    }

    /// Calendar for the dashboard. Never fails: when no source can be
    /// reached the result is empty with `has_connection` unset.
    pub async fn get_calendar_data(
        &self,
        user_id: &str,
        force_refresh: bool,
        access_token: Option<&str>,
    ) -> CalendarData {
        let now = Utc::now();

        if !force_refresh {
            match get_cached_calendar(&self.db, user_id, now).await {
                Ok(Some(cached)) => {
                    tracing::debug!(user_id, "Serving calendar from cache");
                    return cached;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(user_id, error = %e, "Reading calendar cache failed"),
            }
        }

        let sources = self.sources(user_id, access_token);
        if sources.is_empty() {
            tracing::warn!(user_id, "No calendar source configured");
            return CalendarData::empty(now);
        }

        let Some(fetched) = fetch_first(&sources, now).await else {
            tracing::error!(user_id, "All calendar sources failed");
            return CalendarData::empty(now);
        };

        let data = CalendarData::select(
            transform_events(&fetched.upcoming, now),
            transform_events(&fetched.past, now),
            now,
            true,
        );

        if let Err(e) = cache_calendar(&self.db, user_id, &data, now).await {
            tracing::warn!(user_id, error = %e, "Writing calendar cache failed");
        }

        data
    }

    /// Whether the access token can still read the user's calendar
    pub async fn check_connection(&self, access_token: &str) -> bool {
        self.google_client(Credentials::AccessToken(access_token.to_string()))
            .check_connection()
            .await
    }
}

/// Try each source in order and return the first successful fetch
pub async fn fetch_first(sources: &[Box<dyn EventSource>], now: DateTime<Utc>) -> Option<FetchedEvents> {
    for source in sources {
        match source.fetch_events(now).await {
            Ok(fetched) => {
                tracing::info!(
                    source = source.name(),
                    upcoming = fetched.upcoming.len(),
                    past = fetched.past.len(),
                    "Fetched calendar events"
                );
                return Some(fetched);
            }
            Err(e) => {
                tracing::warn!(source = source.name(), error = %e, "Calendar source failed, trying next");
            }
        }
    }
    None
}
