//! Turn raw Google Calendar events into dashboard meetings

use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use regex::Regex;

use super::models::{Attendee, Meeting, Organizer, ResponseStatus};
use crate::google::gcal::{EventDateTime, EventPerson, GoogleEvent};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 1000;
pub const MAX_LOCATION_LEN: usize = 200;
pub const UNTITLED: &str = "Untitled Meeting";

static MEETING_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https://[^\s]*(?:zoom|meet|teams|webex)[^\s]*").expect("Invalid meeting URL pattern")
});

/// Timed events carry `dateTime`, all-day events only a `date` which
/// is read as midnight UTC.
pub fn parse_event_time(value: Option<&EventDateTime>) -> Option<DateTime<Utc>> {
    let value = value?;
    if let Some(date_time) = &value.date_time
        && let Ok(parsed) = DateTime::parse_from_rfc3339(date_time)
    {
        return Some(parsed.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value.date.as_deref()?, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

pub fn extract_meeting_url(event: &GoogleEvent) -> Option<String> {
    if let Some(link) = event.hangout_link.as_ref().filter(|l| !l.is_empty()) {
        return Some(link.clone());
    }

    let video = event
        .conference_data
        .as_ref()
        .and_then(|c| c.entry_points.as_ref())
        .and_then(|points| {
            points
                .iter()
                .find(|p| p.entry_point_type.as_deref() == Some("video"))
                .and_then(|p| p.uri.clone())
        });
    if video.is_some() {
        return video;
    }

    event
        .description
        .as_deref()
        .and_then(|desc| MEETING_URL_RE.find(desc))
        .map(|m| m.as_str().to_string())
}

fn generate_meeting_id(now: DateTime<Utc>) -> String {
    let suffix = rand::rng()
        .sample_iter(Alphanumeric)
        .take(9)
        .map(char::from)
        .collect::<String>()
        .to_lowercase();
    format!("meeting-{}-{}", now.timestamp_millis(), suffix)
}

fn person_to_organizer(person: &EventPerson) -> Organizer {
    let email = person.email.clone().unwrap_or_default();
    let name = person
        .display_name
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| email.clone());
    Organizer { email, name }
}

/// Convert one event. Cancelled events yield `None`.
pub fn transform_event(event: &GoogleEvent, now: DateTime<Utc>) -> Option<Meeting> {
    if event.status.as_deref() == Some("cancelled") {
        return None;
    }

    let start_time = parse_event_time(event.start.as_ref()).unwrap_or(now);
    let end_time =
        parse_event_time(event.end.as_ref()).unwrap_or_else(|| start_time + Duration::hours(1));
    let duration = ((end_time - start_time).num_seconds() as f64 / 60.0).round().max(0.0) as i64;

    let attendees = event
        .attendees
        .as_deref()
        .unwrap_or_default()
        .iter()
        // Rooms and resources may have no email, they are kept
        .map(|a| {
            let email = a.email.clone().unwrap_or_default();
            let name = a
                .display_name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| email.clone());
            Attendee {
                email,
                name,
                response_status: ResponseStatus::parse(a.response_status.as_deref().unwrap_or_default()),
            }
        })
        .collect();

    let organizer = event
        .organizer
        .as_ref()
        .or(event.creator.as_ref())
        .map(person_to_organizer)
        .unwrap_or_default();

    Some(Meeting {
        id: event.id.clone().unwrap_or_else(|| generate_meeting_id(now)),
        title: event
            .summary
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| UNTITLED.to_string()),
        description: event.description.clone(),
        start_time,
        end_time,
        duration,
        attendees,
        organizer,
        location: event.location.clone(),
        meeting_url: extract_meeting_url(event),
    })
}

fn truncate(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

fn non_empty(value: Option<String>, max: usize) -> Option<String> {
    value
        .map(|v| truncate(v.trim(), max))
        .filter(|v| !v.is_empty())
}

/// Clamp free text fields to their maximum length. Meetings without an
/// id are rejected.
pub fn sanitize_meeting(meeting: Meeting) -> Option<Meeting> {
    let id = meeting.id.trim().to_string();
    if id.is_empty() {
        return None;
    }

    let title = truncate(meeting.title.trim(), MAX_TITLE_LEN);
    Some(Meeting {
        id,
        title: if title.is_empty() { UNTITLED.to_string() } else { title },
        description: non_empty(meeting.description, MAX_DESCRIPTION_LEN),
        location: non_empty(meeting.location, MAX_LOCATION_LEN),
        meeting_url: non_empty(meeting.meeting_url, usize::MAX),
        ..meeting
    })
}

pub fn transform_events(events: &[GoogleEvent], now: DateTime<Utc>) -> Vec<Meeting> {
    events
        .iter()
        .filter_map(|event| transform_event(event, now))
        .filter_map(sanitize_meeting)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::gcal::{ConferenceData, EntryPoint, EventAttendee};
    use chrono::TimeZone;

    fn timed(value: &str) -> Option<EventDateTime> {
        Some(EventDateTime {
            date_time: Some(value.to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn it_transforms_a_full_event() {
        let now = Utc::now();
        let event = GoogleEvent {
            id: Some("evt_1".to_string()),
            summary: Some("Design review".to_string()),
            start: timed("2030-03-01T09:00:00-05:00"),
            end: timed("2030-03-01T09:45:00-05:00"),
            attendees: Some(vec![
                EventAttendee {
                    email: Some("bob@example.com".to_string()),
                    display_name: None,
                    response_status: Some("accepted".to_string()),
                },
                EventAttendee {
                    email: Some("eve@example.com".to_string()),
                    display_name: Some("Eve".to_string()),
                    response_status: Some("unknown".to_string()),
                },
            ]),
            creator: Some(EventPerson {
                email: Some("ada@example.com".to_string()),
                display_name: Some("Ada".to_string()),
            }),
            hangout_link: Some("https://meet.google.com/abc-defg-hij".to_string()),
            ..Default::default()
        };

        let meeting = transform_event(&event, now).unwrap();

        assert_eq!(meeting.id, "evt_1");
        assert_eq!(meeting.start_time, Utc.with_ymd_and_hms(2030, 3, 1, 14, 0, 0).unwrap());
        assert_eq!(meeting.duration, 45);
        assert_eq!(meeting.attendees[0].name, "bob@example.com");
        assert_eq!(meeting.attendees[0].response_status, ResponseStatus::Accepted);
        assert_eq!(meeting.attendees[1].response_status, ResponseStatus::NeedsAction);
        assert_eq!(meeting.organizer.name, "Ada");
        assert_eq!(
            meeting.meeting_url.as_deref(),
            Some("https://meet.google.com/abc-defg-hij")
        );
    }

    #[test]
    fn it_fills_in_defaults() {
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap();
        let meeting = transform_event(&GoogleEvent::default(), now).unwrap();

        assert!(meeting.id.starts_with("meeting-"));
        assert_eq!(meeting.title, UNTITLED);
        assert_eq!(meeting.start_time, now);
        assert_eq!(meeting.end_time, now + Duration::hours(1));
        assert_eq!(meeting.duration, 60);
        assert_eq!(meeting.organizer, Organizer::default());
    }

    #[test]
    fn it_reads_all_day_dates_as_utc_midnight() {
        let value = EventDateTime {
            date: Some("2030-05-17".to_string()),
            ..Default::default()
        };
        assert_eq!(
            parse_event_time(Some(&value)),
            Some(Utc.with_ymd_and_hms(2030, 5, 17, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_event_time(None), None);
    }

    #[test]
    fn it_keeps_attendees_without_an_email() {
        let now = Utc::now();
        let event = GoogleEvent {
            id: Some("evt_room".to_string()),
            attendees: Some(vec![
                EventAttendee {
                    display_name: Some("Board Room".to_string()),
                    ..Default::default()
                },
                EventAttendee {
                    email: Some("a@x.com".to_string()),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        };

        let meeting = transform_event(&event, now).unwrap();

        assert_eq!(meeting.attendees.len(), 2);
        assert_eq!(meeting.attendees[0].email, "");
        assert_eq!(meeting.attendees[0].name, "Board Room");
        assert_eq!(meeting.attendees[1].name, "a@x.com");
        assert_eq!(meeting.attendees[1].response_status, ResponseStatus::NeedsAction);
    }

    #[test]
    fn it_drops_cancelled_events() {
        let event = GoogleEvent {
            id: Some("gone".to_string()),
            status: Some("cancelled".to_string()),
            ..Default::default()
        };
        assert!(transform_events(&[event], Utc::now()).is_empty());
    }

    #[test]
    fn it_prefers_video_entry_points_over_the_description() {
        let event = GoogleEvent {
            conference_data: Some(ConferenceData {
                entry_points: Some(vec![
                    EntryPoint {
                        entry_point_type: Some("phone".to_string()),
                        uri: Some("tel:+1-555".to_string()),
                    },
                    EntryPoint {
                        entry_point_type: Some("video".to_string()),
                        uri: Some("https://teams.microsoft.com/l/abc".to_string()),
                    },
                ]),
            }),
            description: Some("Join https://zoom.us/j/123".to_string()),
            ..Default::default()
        };
        assert_eq!(
            extract_meeting_url(&event).as_deref(),
            Some("https://teams.microsoft.com/l/abc")
        );
    }

    #[test]
    fn it_finds_a_meeting_link_in_the_description() {
        let event = GoogleEvent {
            description: Some("Agenda attached.\nJoin: https://us02web.ZOOM.us/j/987?pwd=x now".to_string()),
            ..Default::default()
        };
        assert_eq!(
            extract_meeting_url(&event).as_deref(),
            Some("https://us02web.ZOOM.us/j/987?pwd=x")
        );

        let plain = GoogleEvent {
            description: Some("See https://example.com/doc".to_string()),
            ..Default::default()
        };
        assert_eq!(extract_meeting_url(&plain), None);
    }

    #[test]
    fn it_sanitizes_long_and_empty_fields() {
        let now = Utc::now();
        let mut meeting = transform_event(&GoogleEvent::default(), now).unwrap();
        meeting.title = "t".repeat(500);
        meeting.description = Some("d".repeat(1500));
        meeting.location = Some("   ".to_string());

        let clean = sanitize_meeting(meeting.clone()).unwrap();
        assert_eq!(clean.title.chars().count(), MAX_TITLE_LEN);
        assert_eq!(clean.description.unwrap().chars().count(), MAX_DESCRIPTION_LEN);
        assert_eq!(clean.location, None);

        meeting.id = " ".to_string();
        assert!(sanitize_meeting(meeting).is_none());
    }
}
