use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of meetings returned for each of upcoming and past
pub const DASHBOARD_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ResponseStatus {
    Accepted,
    Declined,
    Tentative,
    #[default]
    NeedsAction,
}

impl ResponseStatus {
    /// Anything Google sends that we don't recognize is treated as
    /// not yet answered.
    pub fn parse(value: &str) -> Self {
        match value {
            "accepted" => ResponseStatus::Accepted,
            "declined" => ResponseStatus::Declined,
            "tentative" => ResponseStatus::Tentative,
            _ => ResponseStatus::NeedsAction,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Accepted => "accepted",
            ResponseStatus::Declined => "declined",
            ResponseStatus::Tentative => "tentative",
            ResponseStatus::NeedsAction => "needsAction",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub email: String,
    pub name: String,
    pub response_status: ResponseStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Organizer {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Length in minutes
    pub duration: i64,
    pub attendees: Vec<Attendee>,
    pub organizer: Organizer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarData {
    pub upcoming_meetings: Vec<Meeting>,
    pub past_meetings: Vec<Meeting>,
    pub last_updated: DateTime<Utc>,
    pub has_connection: bool,
}

impl CalendarData {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            upcoming_meetings: vec![],
            past_meetings: vec![],
            last_updated: now,
            has_connection: false,
        }
    }

    /// Build the dashboard view from candidate meetings: upcoming ones
    /// start after `now` and are sorted soonest first, past ones ended
    /// before `now` and are sorted most recent first. Each list is
    /// truncated to `DASHBOARD_LIMIT`.
    pub fn select(
        upcoming: Vec<Meeting>,
        past: Vec<Meeting>,
        now: DateTime<Utc>,
        has_connection: bool,
    ) -> Self {
        let mut upcoming_meetings = upcoming
            .into_iter()
            .filter(|m| m.start_time > now)
            .collect::<Vec<_>>();
        upcoming_meetings.sort_by_key(|m| m.start_time);
        upcoming_meetings.truncate(DASHBOARD_LIMIT);

        let mut past_meetings = past
            .into_iter()
            .filter(|m| m.end_time < now)
            .collect::<Vec<_>>();
        past_meetings.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        past_meetings.truncate(DASHBOARD_LIMIT);

        Self {
            upcoming_meetings,
            past_meetings,
            last_updated: now,
            has_connection,
        }
    }

    pub fn all_meetings(&self) -> impl Iterator<Item = &Meeting> {
        self.upcoming_meetings.iter().chain(self.past_meetings.iter())
    }
}
