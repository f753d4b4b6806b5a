//! Meeting record store.
//!
//! Raw SQL over rusqlite, no ORM. Each analyzed meeting and each scheduled
//! meeting is one row; list-valued fields (tasks, minutes, participants) are
//! stored as JSON text columns and every read is an equality filter on
//! `user_id`.

use anyhow::{Context, Result};
use rusqlite::Connection;

pub mod analyses;
pub mod stats;
pub mod upcoming;

pub use analyses::{AnalysisRepository, MeetingAnalysis, NewAnalysis, TaskItem, TaskUpdate};
pub use stats::UserStats;
pub use upcoming::{NewUpcomingMeeting, UpcomingMeeting, UpcomingRepository};

pub fn init_db() -> Result<Connection> {
    let db_path = crate::global::db_file()?;

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let conn = Connection::open(&db_path).context("Failed to open database connection")?;

    migrate(&conn)?;

    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS meeting_analysis (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            source TEXT NOT NULL,
            transcript TEXT NOT NULL,
            summary TEXT NOT NULL,
            tasks TEXT NOT NULL,
            minutes TEXT NOT NULL,
            participants TEXT NOT NULL,
            audio_path TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            user_id TEXT NOT NULL,
            user_email TEXT NOT NULL
        )",
        [],
    )
    .context("Failed to create meeting_analysis table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_analysis_user_id ON meeting_analysis(user_id)",
        [],
    )
    .context("Failed to create meeting_analysis user index")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_analysis_timestamp ON meeting_analysis(timestamp DESC)",
        [],
    )
    .context("Failed to create meeting_analysis timestamp index")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS upcoming_meetings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            meeting_title TEXT NOT NULL,
            meeting_description TEXT NOT NULL DEFAULT '',
            meeting_link TEXT NOT NULL,
            meeting_type TEXT NOT NULL,
            date_time INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )",
        [],
    )
    .context("Failed to create upcoming_meetings table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_upcoming_user_id ON upcoming_meetings(user_id)",
        [],
    )
    .context("Failed to create upcoming_meetings user index")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_upcoming_date_time ON upcoming_meetings(date_time)",
        [],
    )
    .context("Failed to create upcoming_meetings date index")?;

    Ok(())
}

#[cfg(test)]
pub(crate) fn open_test_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    migrate(&conn).unwrap();
    conn
}
