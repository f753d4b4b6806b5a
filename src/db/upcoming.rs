//! Scheduled/upcoming meeting persistence.
//!
//! Entries are created once and only ever read back; nothing updates or
//! deletes them. `date_time` is advisory — no overlap or link validation.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, TimeZone, Utc};
use rusqlite::{params, Connection};
use serde::{Serialize, Serializer};

/// Format an epoch-milliseconds instant as ISO-8601 with millisecond
/// precision, e.g. `2025-01-01T10:00:00.000Z`.
pub fn iso_millis(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

fn serialize_instant<S: Serializer>(ms: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&iso_millis(*ms))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingMeeting {
    pub id: i64,
    pub user_id: String,
    pub meeting_title: String,
    pub meeting_description: String,
    pub meeting_link: String,
    pub meeting_type: String,
    #[serde(serialize_with = "serialize_instant")]
    pub date_time: i64,
    #[serde(serialize_with = "serialize_instant")]
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewUpcomingMeeting {
    pub user_id: String,
    pub meeting_title: String,
    pub meeting_description: String,
    pub meeting_link: String,
    pub meeting_type: String,
    pub date_time: i64,
    pub created_at: i64,
}

const COLUMNS: &str = "id, user_id, meeting_title, meeting_description, meeting_link, \
                       meeting_type, date_time, created_at";

pub struct UpcomingRepository;

impl UpcomingRepository {
    pub fn insert(conn: &Connection, entry: &NewUpcomingMeeting) -> Result<i64> {
        conn.execute(
            "INSERT INTO upcoming_meetings (user_id, meeting_title, meeting_description, \
             meeting_link, meeting_type, date_time, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.user_id,
                entry.meeting_title,
                entry.meeting_description,
                entry.meeting_link,
                entry.meeting_type,
                entry.date_time,
                entry.created_at,
            ],
        )
        .context("Failed to insert upcoming meeting")?;

        Ok(conn.last_insert_rowid())
    }

    pub fn get(conn: &Connection, id: i64) -> Result<Option<UpcomingMeeting>> {
        let sql = format!("SELECT {COLUMNS} FROM upcoming_meetings WHERE id = ?1");
        let mut stmt = conn
            .prepare(&sql)
            .context("Failed to prepare upcoming meeting query")?;

        let mut rows = stmt
            .query_map(params![id], Self::from_row)
            .context("Failed to query upcoming meeting")?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// All of a user's scheduled meetings, soonest first.
    pub fn list_by_user(conn: &Connection, user_id: &str) -> Result<Vec<UpcomingMeeting>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM upcoming_meetings WHERE user_id = ?1 \
             ORDER BY date_time ASC, id ASC"
        );
        let mut stmt = conn
            .prepare(&sql)
            .context("Failed to prepare upcoming list query")?;

        let rows = stmt
            .query_map(params![user_id], Self::from_row)
            .context("Failed to list upcoming meetings")?;

        let mut meetings = Vec::new();
        for row in rows {
            meetings.push(row?);
        }

        Ok(meetings)
    }

    /// The user's next strictly-future meetings, soonest first.
    pub fn next_for_user(
        conn: &Connection,
        user_id: &str,
        now_ms: i64,
        limit: usize,
    ) -> Result<Vec<UpcomingMeeting>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM upcoming_meetings \
             WHERE user_id = ?1 AND date_time > ?2 \
             ORDER BY date_time ASC, id ASC LIMIT ?3"
        );
        let mut stmt = conn
            .prepare(&sql)
            .context("Failed to prepare next-upcoming query")?;

        let rows = stmt
            .query_map(params![user_id, now_ms, limit as i64], Self::from_row)
            .context("Failed to query next upcoming meetings")?;

        let mut meetings = Vec::new();
        for row in rows {
            meetings.push(row?);
        }

        Ok(meetings)
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UpcomingMeeting> {
        Ok(UpcomingMeeting {
            id: row.get(0)?,
            user_id: row.get(1)?,
            meeting_title: row.get(2)?,
            meeting_description: row.get(3)?,
            meeting_link: row.get(4)?,
            meeting_type: row.get(5)?,
            date_time: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_test_db;

    fn sample_entry(user_id: &str, date_time: i64) -> NewUpcomingMeeting {
        NewUpcomingMeeting {
            user_id: user_id.to_string(),
            meeting_title: "Sync".to_string(),
            meeting_description: "Weekly sync".to_string(),
            meeting_link: "http://x".to_string(),
            meeting_type: "scheduled".to_string(),
            date_time,
            created_at: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let conn = open_test_db();
        let id = UpcomingRepository::insert(&conn, &sample_entry("u1", 1000)).unwrap();
        assert!(id > 0);

        let meeting = UpcomingRepository::get(&conn, id).unwrap().unwrap();
        assert_eq!(meeting.meeting_title, "Sync");
        assert_eq!(meeting.meeting_type, "scheduled");
        assert_eq!(meeting.date_time, 1000);
    }

    #[test]
    fn test_list_sorted_ascending() {
        let conn = open_test_db();
        UpcomingRepository::insert(&conn, &sample_entry("u1", 300)).unwrap();
        UpcomingRepository::insert(&conn, &sample_entry("u1", 100)).unwrap();
        UpcomingRepository::insert(&conn, &sample_entry("u1", 200)).unwrap();
        UpcomingRepository::insert(&conn, &sample_entry("u2", 50)).unwrap();

        let meetings = UpcomingRepository::list_by_user(&conn, "u1").unwrap();
        let times: Vec<i64> = meetings.iter().map(|m| m.date_time).collect();
        assert_eq!(times, vec![100, 200, 300]);
    }

    #[test]
    fn test_next_for_user_skips_past_meetings() {
        let conn = open_test_db();
        UpcomingRepository::insert(&conn, &sample_entry("u1", 100)).unwrap();
        UpcomingRepository::insert(&conn, &sample_entry("u1", 500)).unwrap();
        UpcomingRepository::insert(&conn, &sample_entry("u1", 600)).unwrap();
        UpcomingRepository::insert(&conn, &sample_entry("u1", 700)).unwrap();

        let meetings = UpcomingRepository::next_for_user(&conn, "u1", 200, 2).unwrap();
        let times: Vec<i64> = meetings.iter().map(|m| m.date_time).collect();
        assert_eq!(times, vec![500, 600]);
    }

    #[test]
    fn test_iso_millis_formatting() {
        // 2025-01-01T10:00:00Z
        assert_eq!(iso_millis(1_735_725_600_000), "2025-01-01T10:00:00.000Z");
    }

    #[test]
    fn test_serializes_instants_as_iso_strings() {
        let conn = open_test_db();
        let id = UpcomingRepository::insert(&conn, &sample_entry("u1", 1_735_725_600_000)).unwrap();
        let meeting = UpcomingRepository::get(&conn, id).unwrap().unwrap();

        let json = serde_json::to_value(&meeting).unwrap();
        assert_eq!(json["dateTime"], "2025-01-01T10:00:00.000Z");
        assert_eq!(json["meetingTitle"], "Sync");
        assert!(json["createdAt"].as_str().unwrap().ends_with('Z'));
    }
}
