//! Analyzed-meeting persistence.
//!
//! One row per completed capture/upload. Rows are immutable after insert
//! except for the `completed` flag on individual tasks, which is toggled by
//! task title.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};

/// A single action item extracted from a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskItem {
    pub title: String,
    pub due_date: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

/// An analyzed meeting read back from the store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingAnalysis {
    pub id: i64,
    pub title: String,
    pub source: String,
    pub transcript: String,
    pub summary: String,
    pub tasks: Vec<TaskItem>,
    pub minutes: Vec<String>,
    pub participants: Vec<String>,
    pub audio_path: String,
    pub timestamp: i64,
    pub user_id: String,
    pub user_email: String,
}

/// Fields for a new analysis row. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewAnalysis {
    pub title: String,
    pub source: String,
    pub transcript: String,
    pub summary: String,
    pub tasks: Vec<TaskItem>,
    pub minutes: Vec<String>,
    pub participants: Vec<String>,
    pub audio_path: String,
    pub timestamp: i64,
    pub user_id: String,
    pub user_email: String,
}

/// Outcome of a task completion update.
#[derive(Debug, PartialEq)]
pub enum TaskUpdate {
    Updated,
    MeetingNotFound,
}

const COLUMNS: &str = "id, title, source, transcript, summary, tasks, minutes, \
                       participants, audio_path, timestamp, user_id, user_email";

pub struct AnalysisRepository;

impl AnalysisRepository {
    /// Insert a completed analysis. Returns the new row id.
    pub fn insert(conn: &Connection, analysis: &NewAnalysis) -> Result<i64> {
        conn.execute(
            "INSERT INTO meeting_analysis (title, source, transcript, summary, tasks, \
             minutes, participants, audio_path, timestamp, user_id, user_email) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                analysis.title,
                analysis.source,
                analysis.transcript,
                analysis.summary,
                serde_json::to_string(&analysis.tasks)?,
                serde_json::to_string(&analysis.minutes)?,
                serde_json::to_string(&analysis.participants)?,
                analysis.audio_path,
                analysis.timestamp,
                analysis.user_id,
                analysis.user_email,
            ],
        )
        .context("Failed to insert meeting analysis")?;

        Ok(conn.last_insert_rowid())
    }

    /// Get one analysis by id.
    pub fn get(conn: &Connection, id: i64) -> Result<Option<MeetingAnalysis>> {
        let sql = format!("SELECT {COLUMNS} FROM meeting_analysis WHERE id = ?1");
        let mut stmt = conn
            .prepare(&sql)
            .context("Failed to prepare analysis query")?;

        let mut rows = stmt
            .query_map(params![id], Self::from_row)
            .context("Failed to query analysis")?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// List a user's analyses, newest first.
    pub fn list_by_user(
        conn: &Connection,
        user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<MeetingAnalysis>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM meeting_analysis WHERE user_id = ?1 \
             ORDER BY timestamp DESC, id DESC LIMIT ?2"
        );
        let mut stmt = conn
            .prepare(&sql)
            .context("Failed to prepare analyses list query")?;

        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = stmt
            .query_map(params![user_id, limit], Self::from_row)
            .context("Failed to list analyses")?;

        let mut analyses = Vec::new();
        for row in rows {
            analyses.push(row?);
        }

        Ok(analyses)
    }

    /// Set the completion flag on every task matching `task_title`.
    ///
    /// The read-modify-write of the task list runs inside a single immediate
    /// transaction, so two concurrent toggles on the same meeting cannot lose
    /// an update. A title matching no task is still a successful no-op.
    pub fn set_task_completion(
        conn: &mut Connection,
        meeting_id: i64,
        task_title: &str,
        completed: bool,
    ) -> Result<TaskUpdate> {
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to begin task update transaction")?;

        let tasks_json: Option<String> = tx
            .query_row(
                "SELECT tasks FROM meeting_analysis WHERE id = ?1",
                params![meeting_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read tasks for update")?;

        let Some(tasks_json) = tasks_json else {
            return Ok(TaskUpdate::MeetingNotFound);
        };

        let mut tasks: Vec<TaskItem> =
            serde_json::from_str(&tasks_json).context("Stored task list is not valid JSON")?;

        for task in tasks.iter_mut().filter(|t| t.title == task_title) {
            task.completed = completed;
        }

        tx.execute(
            "UPDATE meeting_analysis SET tasks = ?1 WHERE id = ?2",
            params![serde_json::to_string(&tasks)?, meeting_id],
        )
        .context("Failed to write updated tasks")?;

        tx.commit().context("Failed to commit task update")?;
        Ok(TaskUpdate::Updated)
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MeetingAnalysis> {
        let tasks_json: String = row.get(5)?;
        let minutes_json: String = row.get(6)?;
        let participants_json: String = row.get(7)?;

        Ok(MeetingAnalysis {
            id: row.get(0)?,
            title: row.get(1)?,
            source: row.get(2)?,
            transcript: row.get(3)?,
            summary: row.get(4)?,
            tasks: serde_json::from_str(&tasks_json)
                .map_err(|_| rusqlite::Error::InvalidQuery)?,
            minutes: serde_json::from_str(&minutes_json)
                .map_err(|_| rusqlite::Error::InvalidQuery)?,
            participants: serde_json::from_str(&participants_json)
                .map_err(|_| rusqlite::Error::InvalidQuery)?,
            audio_path: row.get(8)?,
            timestamp: row.get(9)?,
            user_id: row.get(10)?,
            user_email: row.get(11)?,
        })
    }
}
