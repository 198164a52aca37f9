//! Providers of raw calendar events, tried in order by the calendar
//! service until one succeeds.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::composio::ComposioClient;
use crate::google::gcal::{EventQuery, GoogleCalendarClient, GoogleEvent};

pub const UPCOMING_MAX_RESULTS: u32 = 10;
pub const PAST_MAX_RESULTS: u32 = 100;
pub const PAST_WINDOW_DAYS: i64 = 30;
/// Past events come back oldest first, so every page of the window is
/// needed to find the most recent ones
pub const PAST_MAX_PAGES: u32 = 10;

#[derive(Debug, Default)]
pub struct FetchedEvents {
    pub upcoming: Vec<GoogleEvent>,
    pub past: Vec<GoogleEvent>,
}

pub fn upcoming_query(now: DateTime<Utc>) -> EventQuery {
    EventQuery {
        time_min: now,
        time_max: None,
        max_results: UPCOMING_MAX_RESULTS,
        max_pages: 1,
    }
}

pub fn past_query(now: DateTime<Utc>) -> EventQuery {
    EventQuery {
        time_min: now - Duration::days(PAST_WINDOW_DAYS),
        time_max: Some(now),
        max_results: PAST_MAX_RESULTS,
        max_pages: PAST_MAX_PAGES,
    }
}

#[async_trait]
pub trait EventSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetch upcoming and past events relative to `now`
    async fn fetch_events(&self, now: DateTime<Utc>) -> Result<FetchedEvents>;
}

/// A source only fails when both halves fail. One failed half is
/// logged and treated as empty.
fn join_halves(
    source: &str,
    upcoming: Result<Vec<GoogleEvent>>,
    past: Result<Vec<GoogleEvent>>,
) -> Result<FetchedEvents> {
    match (upcoming, past) {
        (Ok(upcoming), Ok(past)) => Ok(FetchedEvents { upcoming, past }),
        (Ok(upcoming), Err(e)) => {
            tracing::warn!(source, error = %e, "Fetching past events failed");
            Ok(FetchedEvents { upcoming, past: vec![] })
        }
        (Err(e), Ok(past)) => {
            tracing::warn!(source, error = %e, "Fetching upcoming events failed");
            Ok(FetchedEvents { upcoming: vec![], past })
        }
        (Err(upcoming_err), Err(past_err)) => Err(anyhow!(
            "{} failed to fetch events: {}; {}",
            source,
            upcoming_err,
            past_err
        )),
    }
}

pub struct ComposioSource {
    client: ComposioClient,
    user_id: String,
}

impl ComposioSource {
    pub fn new(client: ComposioClient, user_id: &str) -> Self {
        Self {
            client,
            user_id: user_id.to_string(),
        }
    }
}

#[async_trait]
impl EventSource for ComposioSource {
    fn name(&self) -> &'static str {
        "composio"
    }

    async fn fetch_events(&self, now: DateTime<Utc>) -> Result<FetchedEvents> {
        let account = self
            .client
            .get_connected_account(&self.user_id)
            .await?
            .ok_or_else(|| anyhow!("No connected calendar account for {}", self.user_id))?;
        if account.status != "ACTIVE" {
            anyhow::bail!("Connected calendar account is {}", account.status);
        }

        let (upcoming_q, past_q) = (upcoming_query(now), past_query(now));
        let (upcoming, past) = tokio::join!(
            self.client.list_events(&account.id, &upcoming_q),
            self.client.list_events(&account.id, &past_q),
        );
        join_halves(self.name(), upcoming, past)
    }
}

/// The signed in user's primary calendar via their OAuth access token
pub struct GoogleOAuthSource {
    client: GoogleCalendarClient,
}

impl GoogleOAuthSource {
    pub fn new(client: GoogleCalendarClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventSource for GoogleOAuthSource {
    fn name(&self) -> &'static str {
        "google_oauth"
    }

    async fn fetch_events(&self, now: DateTime<Utc>) -> Result<FetchedEvents> {
        let calendar_id = self.client.primary_calendar_id().await?;
        let (upcoming_q, past_q) = (upcoming_query(now), past_query(now));
        let (upcoming, past) = tokio::join!(
            self.client.list_events(&calendar_id, &upcoming_q),
            self.client.list_events(&calendar_id, &past_q),
        );
        join_halves(self.name(), upcoming, past)
    }
}

/// A public calendar read with an API key
pub struct GoogleApiKeySource {
    client: GoogleCalendarClient,
    calendar_id: String,
}

impl GoogleApiKeySource {
    pub fn new(client: GoogleCalendarClient, calendar_id: &str) -> Self {
        Self {
            client,
            calendar_id: calendar_id.to_string(),
        }
    }
}

#[async_trait]
impl EventSource for GoogleApiKeySource {
    fn name(&self) -> &'static str {
        "google_api_key"
    }

    async fn fetch_events(&self, now: DateTime<Utc>) -> Result<FetchedEvents> {
        let (upcoming_q, past_q) = (upcoming_query(now), past_query(now));
        let (upcoming, past) = tokio::join!(
            self.client.list_events(&self.calendar_id, &upcoming_q),
            self.client.list_events(&self.calendar_id, &past_q),
        );
        join_halves(self.name(), upcoming, past)
    }
}
