//! Google Calendar v3 client for listing calendars and events

use anyhow::{Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::retry::{RetryPolicy, with_retry};

/// Fields requested from `events.list`, enough to build a `Meeting`
const EVENT_FIELDS: &str = "nextPageToken,items(id,summary,description,start,end,attendees,organizer,creator,location,hangoutLink,conferenceData,status)";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventDateTime {
    pub date_time: Option<String>,
    pub date: Option<String>,
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventPerson {
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventAttendee {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub response_status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryPoint {
    pub entry_point_type: Option<String>,
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConferenceData {
    pub entry_points: Option<Vec<EntryPoint>>,
}

/// An event as returned by the Calendar API. Every field is optional
/// since the connector service passes these through with varying
/// completeness.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoogleEvent {
    pub id: Option<String>,
    pub status: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<EventDateTime>,
    pub end: Option<EventDateTime>,
    pub attendees: Option<Vec<EventAttendee>>,
    pub organizer: Option<EventPerson>,
    pub creator: Option<EventPerson>,
    pub hangout_link: Option<String>,
    pub conference_data: Option<ConferenceData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarListEntry {
    pub id: Option<String>,
    pub summary: Option<String>,
    pub primary: Option<bool>,
    pub access_role: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CalendarListResponse {
    items: Option<Vec<CalendarListEntry>>,
}

/// Parse raw event objects, dropping anything that doesn't look like an
/// event instead of failing the whole batch.
pub fn parse_events(items: Vec<Value>) -> Vec<GoogleEvent> {
    items
        .into_iter()
        .filter(|item| item.is_object())
        .filter_map(|item| match serde_json::from_value::<GoogleEvent>(item) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!("Skipping malformed calendar event: {}", e);
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub enum Credentials {
    /// OAuth access token for the signed in user
    AccessToken(String),
    /// API key, only works for public calendars
    ApiKey(String),
}

#[derive(Debug, Clone)]
pub struct EventQuery {
    pub time_min: DateTime<Utc>,
    pub time_max: Option<DateTime<Utc>>,
    /// Page size
    pub max_results: u32,
    /// Follow `nextPageToken` for at most this many pages
    pub max_pages: u32,
}

#[derive(Clone)]
pub struct GoogleCalendarClient {
    http: Client,
    base_url: String,
    credentials: Credentials,
    retry: RetryPolicy,
}

impl GoogleCalendarClient {
    pub fn new(http: Client, base_url: &str, credentials: Credentials) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn request(&self, url: &str) -> RequestBuilder {
        let builder = self.http.get(url);
        match &self.credentials {
            Credentials::AccessToken(token) => builder.bearer_auth(token),
            Credentials::ApiKey(key) => builder.query(&[("key", key)]),
        }
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let res = with_retry(&self.retry, || self.request(url).query(query).send()).await?;
        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("Google Calendar request failed: {} ({})", status, text);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Find the id of the user's primary calendar
    pub async fn primary_calendar_id(&self) -> Result<String> {
        let url = format!("{}/calendar/v3/users/me/calendarList", self.base_url);
        let query = [
            ("maxResults", "100".to_string()),
            ("showDeleted", "false".to_string()),
            ("fields", "items(id,summary,primary,accessRole)".to_string()),
        ];
        let value = self.get_json(&url, &query).await?;
        let list: CalendarListResponse = serde_json::from_value(value)?;

        list.items
            .unwrap_or_default()
            .into_iter()
            .find(|cal| cal.primary == Some(true))
            .and_then(|cal| cal.id)
            .ok_or_else(|| anyhow!("No primary calendar found"))
    }

    /// List single (expanded) events ordered by start time, following
    /// continuation pages up to `params.max_pages`
    pub async fn list_events(&self, calendar_id: &str, params: &EventQuery) -> Result<Vec<GoogleEvent>> {
        let url = format!(
            "{}/calendar/v3/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        );
        let mut query = vec![
            ("timeMin", params.time_min.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("maxResults", params.max_results.to_string()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
            ("fields", EVENT_FIELDS.to_string()),
        ];
        if let Some(time_max) = params.time_max {
            query.push(("timeMax", time_max.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }

        let mut events = vec![];
        let mut page_token: Option<String> = None;
        let max_pages = params.max_pages.max(1);
        for page in 1..=max_pages {
            let mut page_query = query.clone();
            if let Some(token) = page_token.take() {
                page_query.push(("pageToken", token));
            }

            let value = self.get_json(&url, &page_query).await?;
            if let Some(Value::Array(items)) = value.get("items") {
                events.extend(parse_events(items.clone()));
            }

            match value.get("nextPageToken").and_then(Value::as_str) {
                Some(token) if page < max_pages => page_token = Some(token.to_string()),
                Some(_) => {
                    tracing::warn!(calendar_id, pages = page, "Stopped listing events at the page limit");
                    break;
                }
                None => break,
            }
        }
        Ok(events)
    }

    /// Cheap call to verify the credentials still grant calendar access
    pub async fn check_connection(&self) -> bool {
        let url = format!("{}/calendar/v3/calendars/primary", self.base_url);
        match with_retry(&self.retry, || self.request(&url).send()).await {
            Ok(res) => res.status().is_success(),
            Err(e) => {
                tracing::warn!("Calendar connection check failed: {}", e);
                false
            }
        }
    }
}
