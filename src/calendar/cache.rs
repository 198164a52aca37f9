//! Per-user meeting cache in SQLite. Entries are fresh for five minutes
//! after the last write.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use super::models::{Attendee, CalendarData, Meeting, Organizer, ResponseStatus};

pub const CACHE_TTL_SECS: i64 = 300;

struct MeetingRow {
    id: String,
    title: String,
    description: Option<String>,
    start_time: String,
    end_time: String,
    duration: i64,
    location: Option<String>,
    meeting_url: Option<String>,
    organizer_email: String,
    organizer_name: String,
}

struct AttendeeRow {
    meeting_id: String,
    email: String,
    name: String,
    response_status: String,
}

fn to_db_time(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn from_db_time(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

fn assemble(rows: Vec<MeetingRow>, attendee_rows: Vec<AttendeeRow>) -> Result<Vec<Meeting>> {
    let mut attendees: HashMap<String, Vec<Attendee>> = HashMap::new();
    for row in attendee_rows {
        attendees.entry(row.meeting_id).or_default().push(Attendee {
            email: row.email,
            name: row.name,
            response_status: ResponseStatus::parse(&row.response_status),
        });
    }

    rows.into_iter()
        .map(|row| {
            Ok(Meeting {
                attendees: attendees.remove(&row.id).unwrap_or_default(),
                start_time: from_db_time(&row.start_time)?,
                end_time: from_db_time(&row.end_time)?,
                id: row.id,
                title: row.title,
                description: row.description,
                duration: row.duration,
                organizer: Organizer {
                    email: row.organizer_email,
                    name: row.organizer_name,
                },
                location: row.location,
                meeting_url: row.meeting_url,
            })
        })
        .collect()
}

const MEETING_COLUMNS: &str = "id, title, description, start_time, end_time, duration_minutes, location, meeting_url, organizer_email, organizer_name";

fn read_meeting_row(row: &rusqlite::Row) -> Result<MeetingRow, rusqlite::Error> {
    Ok(MeetingRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        duration: row.get(5)?,
        location: row.get(6)?,
        meeting_url: row.get(7)?,
        organizer_email: row.get(8)?,
        organizer_name: row.get(9)?,
    })
}

fn read_attendee_row(row: &rusqlite::Row) -> Result<AttendeeRow, rusqlite::Error> {
    Ok(AttendeeRow {
        meeting_id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        response_status: row.get(3)?,
    })
}

/// Cached calendar for `user_id` if it was written less than
/// `CACHE_TTL_SECS` ago. Meetings are re-split into upcoming and past
/// against `now`, so a meeting that started since the write moves over.
pub async fn get_cached_calendar(
    db: &Connection,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<CalendarData>> {
    let user = user_id.to_string();
    let cutoff = now.timestamp() - CACHE_TTL_SECS;

    let rows = db
        .call(move |conn| {
            let last_cached: Option<i64> = conn.query_row(
                "SELECT MAX(cached_at) FROM meetings WHERE user_id = ?1",
                [&user],
                |row| row.get(0),
            )?;
            match last_cached {
                Some(ts) if ts > cutoff => {}
                _ => return Ok(None),
            }

            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM meetings WHERE user_id = ?1 ORDER BY start_time",
                MEETING_COLUMNS
            ))?;
            let meetings = stmt
                .query_map([&user], read_meeting_row)?
                .collect::<Result<Vec<_>, _>>()?;

            let mut stmt = conn.prepare(
                "SELECT meeting_id, email, name, response_status
                 FROM meeting_attendees WHERE user_id = ?1 ORDER BY id",
            )?;
            let attendees = stmt
                .query_map([&user], read_attendee_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Some((meetings, attendees)))
        })
        .await?;

    let Some((meeting_rows, attendee_rows)) = rows else {
        return Ok(None);
    };
    let meetings = assemble(meeting_rows, attendee_rows)?;
    Ok(Some(CalendarData::select(meetings.clone(), meetings, now, true)))
}

/// Replace everything cached for `user_id` with the meetings in `data`
pub async fn cache_calendar(
    db: &Connection,
    user_id: &str,
    data: &CalendarData,
    now: DateTime<Utc>,
) -> Result<()> {
    let user = user_id.to_string();
    let meetings = data.all_meetings().cloned().collect::<Vec<_>>();
    let cached_at = now.timestamp();

    db.call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM meeting_attendees WHERE user_id = ?1", [&user])?;
        tx.execute("DELETE FROM meetings WHERE user_id = ?1", [&user])?;
        {
            let mut insert_meeting = tx.prepare(
                "INSERT OR REPLACE INTO meetings
                 (user_id, id, title, description, start_time, end_time, duration_minutes,
                  location, meeting_url, organizer_email, organizer_name, cached_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )?;
            let mut insert_attendee = tx.prepare(
                "INSERT INTO meeting_attendees (user_id, meeting_id, email, name, response_status)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for m in &meetings {
                insert_meeting.execute(rusqlite::params![
                    user,
                    m.id,
                    m.title,
                    m.description,
                    to_db_time(&m.start_time),
                    to_db_time(&m.end_time),
                    m.duration,
                    m.location,
                    m.meeting_url,
                    m.organizer.email,
                    m.organizer.name,
                    cached_at,
                ])?;
                for a in &m.attendees {
                    insert_attendee.execute(rusqlite::params![
                        user,
                        m.id,
                        a.email,
                        a.name,
                        a.response_status.as_str(),
                    ])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    })
    .await?;

    Ok(())
}

/// A single cached meeting regardless of cache age
pub async fn find_cached_meeting(db: &Connection, user_id: &str, meeting_id: &str) -> Result<Option<Meeting>> {
    let user = user_id.to_string();
    let id = meeting_id.to_string();

    let rows = db
        .call(move |conn| {
            let meeting = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM meetings WHERE user_id = ?1 AND id = ?2",
                        MEETING_COLUMNS
                    ),
                    [&user, &id],
                    read_meeting_row,
                )
                .optional()?;
            let Some(meeting) = meeting else {
                return Ok(None);
            };

            let mut stmt = conn.prepare(
                "SELECT meeting_id, email, name, response_status
                 FROM meeting_attendees WHERE user_id = ?1 AND meeting_id = ?2 ORDER BY id",
            )?;
            let attendees = stmt
                .query_map([&user, &id], read_attendee_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some((meeting, attendees)))
        })
        .await?;

    match rows {
        Some((meeting, attendees)) => Ok(assemble(vec![meeting], attendees)?.pop()),
        None => Ok(None),
    }
}
