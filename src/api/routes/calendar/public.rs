//! Public types for the calendar API
use serde::{Deserialize, Serialize};

pub use crate::calendar::{Attendee, CalendarData, Meeting, Organizer, ResponseStatus};

#[derive(Deserialize)]
pub struct CalendarQuery {
    /// `true` skips the cache
    pub refresh: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    pub redirect_url: Option<String>,
}

/// Both keys carry the same URL, clients read either one
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponse {
    pub redirect_url: String,
    pub connection_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub connected: bool,
}
