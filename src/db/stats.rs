//! Per-user aggregate counts for the profile screen.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::Serialize;

use super::analyses::TaskItem;

/// Aggregate counts: scheduled meetings, analyzed transcriptions, and task
/// totals across all of a user's analyses.
#[derive(Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub meetings: i64,
    pub transcriptions: i64,
    pub tasks: i64,
    pub uncompleted_tasks: i64,
}

pub fn user_stats(conn: &Connection, user_id: &str) -> Result<UserStats> {
    let meetings: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM upcoming_meetings WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .context("Failed to count upcoming meetings")?;

    let mut stmt = conn
        .prepare("SELECT tasks FROM meeting_analysis WHERE user_id = ?1")
        .context("Failed to prepare task count query")?;

    let task_lists = stmt
        .query_map(params![user_id], |row| row.get::<_, String>(0))
        .context("Failed to query task lists")?;

    let mut transcriptions = 0;
    let mut tasks = 0;
    let mut uncompleted_tasks = 0;

    for task_json in task_lists {
        transcriptions += 1;
        let list: Vec<TaskItem> =
            serde_json::from_str(&task_json?).context("Stored task list is not valid JSON")?;
        tasks += list.len() as i64;
        uncompleted_tasks += list.iter().filter(|t| !t.completed).count() as i64;
    }

    Ok(UserStats {
        meetings,
        transcriptions,
        tasks,
        uncompleted_tasks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        open_test_db, AnalysisRepository, NewAnalysis, NewUpcomingMeeting, UpcomingRepository,
    };

    fn analysis_with_tasks(user_id: &str, completed: &[bool]) -> NewAnalysis {
        NewAnalysis {
            title: "Meeting".to_string(),
            source: "recording".to_string(),
            transcript: "text".to_string(),
            summary: "summary".to_string(),
            tasks: completed
                .iter()
                .enumerate()
                .map(|(i, &done)| TaskItem {
                    title: format!("Task {i}"),
                    due_date: None,
                    completed: done,
                })
                .collect(),
            minutes: vec![],
            participants: vec![],
            audio_path: "/tmp/a.mp3".to_string(),
            timestamp: 0,
            user_id: user_id.to_string(),
            user_email: "u@example.com".to_string(),
        }
    }

    #[test]
    fn test_stats_empty_user() {
        let conn = open_test_db();
        let stats = user_stats(&conn, "nobody").unwrap();
        assert_eq!(stats, UserStats::default());
    }

    #[test]
    fn test_stats_counts_per_user() {
        let conn = open_test_db();
        AnalysisRepository::insert(&conn, &analysis_with_tasks("u1", &[true, false])).unwrap();
        AnalysisRepository::insert(&conn, &analysis_with_tasks("u1", &[false])).unwrap();
        AnalysisRepository::insert(&conn, &analysis_with_tasks("u2", &[false, false])).unwrap();

        UpcomingRepository::insert(
            &conn,
            &NewUpcomingMeeting {
                user_id: "u1".to_string(),
                meeting_title: "Sync".to_string(),
                meeting_description: String::new(),
                meeting_link: "http://x".to_string(),
                meeting_type: "scheduled".to_string(),
                date_time: 0,
                created_at: 0,
            },
        )
        .unwrap();

        let stats = user_stats(&conn, "u1").unwrap();
        assert_eq!(stats.meetings, 1);
        assert_eq!(stats.transcriptions, 2);
        assert_eq!(stats.tasks, 3);
        assert_eq!(stats.uncompleted_tasks, 2);
    }

    #[test]
    fn test_stats_serializes_camel_case() {
        let stats = UserStats {
            meetings: 1,
            transcriptions: 2,
            tasks: 3,
            uncompleted_tasks: 4,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["uncompletedTasks"], 4);
    }
}
