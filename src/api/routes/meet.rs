//! Meeting API endpoints under `/api/meet`.
//!
//! Capture/analysis entry points plus reads over the record store. All
//! user-scoped reads filter on the caller-supplied identity header; handlers
//! never panic and map every failure to a JSON error body.

use axum::{
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Request, State},
    http::{header::CONTENT_TYPE, HeaderMap},
    response::Json,
    routing::{get, patch, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::capture::RecordingAcquirer;
use crate::db::{
    self, AnalysisRepository, NewAnalysis, NewUpcomingMeeting, TaskUpdate, UpcomingRepository,
};
use crate::pipeline::{AnalysisPipeline, AnalysisResult};

const USER_ID_HEADER: &str = "x-user-id";
const USER_EMAIL_HEADER: &str = "x-user-email";

/// Uploaded recordings can be large; meeting audio at an hour runs well past
/// axum's 2 MB default.
const MAX_UPLOAD_BYTES: usize = 250 * 1024 * 1024;

/// Shared state for meeting routes.
#[derive(Clone)]
pub struct MeetState {
    pub acquirer: Arc<RecordingAcquirer>,
    pub pipeline: Arc<AnalysisPipeline>,
    /// One live capture at a time: a single browser instance and a single
    /// audio device per process.
    pub capture_lock: Arc<Mutex<()>>,
}

pub fn router(state: MeetState) -> Router {
    Router::new()
        .route("/record", post(record_live_meeting))
        .route("/analyze", post(analyze_recording))
        .route("/:user_id/completed-meetings", get(completed_meetings))
        .route("/meetings/:id", get(get_meeting))
        .route("/my-meetings", get(my_meetings))
        .route("/tasks", get(list_tasks))
        .route("/tasks/:meeting_id/:task_title", patch(update_task))
        .route("/recent-activity/:user_id", get(recent_activity))
        .route("/add-meeting", post(add_meeting))
        .route("/:user_id/all-upcoming-meetings", get(all_upcoming_meetings))
        .route("/upcoming-meetings/:user_id", get(next_upcoming_meetings))
        .route("/upcoming-meet-details/:id", get(upcoming_meeting_details))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

fn required_header(headers: &HeaderMap, name: &str) -> ApiResult<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .ok_or_else(|| ApiError::unauthorized("User authentication required"))
}

/// Persist a pipeline result for a user. Runs on the blocking pool since
/// rusqlite is synchronous.
async fn save_analysis(
    analysis: &AnalysisResult,
    title: &str,
    source: &str,
    user_id: &str,
    user_email: &str,
) -> ApiResult<i64> {
    let new = NewAnalysis {
        title: title.to_string(),
        source: source.to_string(),
        transcript: analysis.transcript.clone(),
        summary: analysis.summary.clone(),
        tasks: analysis.tasks.clone(),
        minutes: analysis.minutes.clone(),
        participants: analysis.participants.clone(),
        audio_path: analysis.audio_path.clone(),
        timestamp: analysis.timestamp,
        user_id: user_id.to_string(),
        user_email: user_email.to_string(),
    };

    let id = tokio::task::spawn_blocking(move || {
        let conn = db::init_db()?;
        AnalysisRepository::insert(&conn, &new)
    })
    .await
    .map_err(|_| ApiError::internal("Storage task failed"))??;

    Ok(id)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordRequest {
    meet_link: Option<String>,
    meeting_title: Option<String>,
    /// Optional capture length; defaults to the configured maximum.
    duration_seconds: Option<u64>,
}

/// POST /api/meet/record — join a live meeting, record, analyze, persist.
async fn record_live_meeting(
    State(state): State<MeetState>,
    headers: HeaderMap,
    Json(body): Json<RecordRequest>,
) -> ApiResult<Json<Value>> {
    let (Some(meet_link), Some(meeting_title)) = (body.meet_link, body.meeting_title) else {
        return Err(ApiError::bad_request(
            "Missing required fields: meetLink and meetingTitle",
        ));
    };
    let user_id = required_header(&headers, USER_ID_HEADER)?;
    let user_email = required_header(&headers, USER_EMAIL_HEADER)?;

    info!("Live capture requested for {}", meet_link);

    let audio_path = {
        // Serializes concurrent capture requests rather than contending for
        // the audio device.
        let _capture = state.capture_lock.lock().await;
        state
            .acquirer
            .capture_live(&meet_link, body.duration_seconds.map(Duration::from_secs))
            .await?
    };

    let analysis = state.pipeline.analyze(&audio_path).await?;
    let id = save_analysis(&analysis, &meeting_title, "live", &user_id, &user_email).await?;
    let recording_path = analysis.audio_path.clone();

    Ok(Json(json!({
        "message": "Meeting analyzed successfully.",
        "id": id,
        "analysis": analysis,
        "meetingTitle": meeting_title,
        "recordingPath": recording_path,
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest {
    recording_link: Option<String>,
    meeting_title: Option<String>,
}

/// POST /api/meet/analyze — analyze an uploaded file or a shared link.
///
/// Accepts either a multipart upload (`file` + `meetingTitle` fields) or a
/// JSON body with `recordingLink`, so the body is taken raw and dispatched on
/// content type.
async fn analyze_recording(
    State(state): State<MeetState>,
    request: Request,
) -> ApiResult<Json<Value>> {
    let headers = request.headers().clone();
    let user_id = required_header(&headers, USER_ID_HEADER)?;
    let user_email = required_header(&headers, USER_EMAIL_HEADER)?;

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let (audio_path, meeting_title) = if content_type.starts_with("multipart/form-data") {
        read_multipart_upload(&state, request).await?
    } else {
        let Json(body) = Json::<AnalyzeRequest>::from_request(request, &())
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid request body: {e}")))?;

        let Some(link) = body.recording_link else {
            return Err(ApiError::bad_request("No recording provided"));
        };

        let path = state.acquirer.download_shared_recording(&link).await?;
        (path, body.meeting_title)
    };

    let analysis = state.pipeline.analyze(&audio_path).await?;
    let title = meeting_title.unwrap_or_else(|| "Untitled Meeting".to_string());
    let id = save_analysis(&analysis, &title, "recording", &user_id, &user_email).await?;
    let recording_path = analysis.audio_path.clone();

    Ok(Json(json!({
        "message": "Recording analysis successful",
        "id": id,
        "analysis": analysis,
        "recordingPath": recording_path,
    })))
}

async fn read_multipart_upload(
    state: &MeetState,
    request: Request,
) -> ApiResult<(std::path::PathBuf, Option<String>)> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?;

    let mut meeting_title = None;
    let mut stored_path = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed multipart field: {e}")))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("meetingTitle") => {
                meeting_title = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("Bad title field: {e}")))?,
                );
            }
            Some("file") => {
                let file_name = field
                    .file_name()
                    .unwrap_or("recording.m4a")
                    .to_string();
                // Stream the body straight to disk; recordings run to
                // hundreds of megabytes.
                let mut sink = state.acquirer.create_upload(&file_name).await?;
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Bad file field: {e}")))?
                {
                    sink.write(&chunk).await?;
                }
                stored_path = Some(sink.finish().await?);
            }
            _ => {}
        }
    }

    let Some(path) = stored_path else {
        return Err(ApiError::bad_request("No recording provided"));
    };

    Ok((path, meeting_title))
}

/// GET /api/meet/:user_id/completed-meetings
async fn completed_meetings(Path(user_id): Path<String>) -> ApiResult<Json<Value>> {
    let meetings = tokio::task::spawn_blocking(move || {
        let conn = db::init_db()?;
        AnalysisRepository::list_by_user(&conn, &user_id, None)
    })
    .await
    .map_err(|_| ApiError::internal("Storage task failed"))??;

    if meetings.is_empty() {
        return Err(ApiError::not_found("No meetings found for the user"));
    }

    Ok(Json(json!(meetings)))
}

/// GET /api/meet/meetings/:id
async fn get_meeting(Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    let meeting = tokio::task::spawn_blocking(move || {
        let conn = db::init_db()?;
        AnalysisRepository::get(&conn, id)
    })
    .await
    .map_err(|_| ApiError::internal("Storage task failed"))??;

    match meeting {
        Some(m) => Ok(Json(json!(m))),
        None => Err(ApiError::not_found("Meeting not found")),
    }
}

/// GET /api/meet/my-meetings — header-scoped analysis list.
async fn my_meetings(headers: HeaderMap) -> ApiResult<Json<Value>> {
    let user_id = required_header(&headers, USER_ID_HEADER)?;

    let meetings = tokio::task::spawn_blocking(move || {
        let conn = db::init_db()?;
        AnalysisRepository::list_by_user(&conn, &user_id, None)
    })
    .await
    .map_err(|_| ApiError::internal("Storage task failed"))??;

    Ok(Json(json!(meetings)))
}

/// GET /api/meet/tasks — every task across the caller's analyzed meetings.
async fn list_tasks(headers: HeaderMap) -> ApiResult<Json<Value>> {
    let user_id = required_header(&headers, USER_ID_HEADER)?;

    let meetings = tokio::task::spawn_blocking(move || {
        let conn = db::init_db()?;
        AnalysisRepository::list_by_user(&conn, &user_id, None)
    })
    .await
    .map_err(|_| ApiError::internal("Storage task failed"))??;

    if meetings.is_empty() {
        return Err(ApiError::not_found("No meetings found for the user"));
    }

    let tasks: Vec<Value> = meetings
        .iter()
        .flat_map(|m| {
            m.tasks.iter().map(|t| {
                json!({
                    "taskTitle": t.title,
                    "meetingId": m.id,
                    "meetingTitle": m.title,
                    "dueDate": t.due_date,
                    "completed": t.completed,
                })
            })
        })
        .collect();

    Ok(Json(json!(tasks)))
}

#[derive(Debug, Deserialize)]
struct TaskUpdateRequest {
    completed: bool,
}

/// PATCH /api/meet/tasks/:meeting_id/:task_title
async fn update_task(
    Path((meeting_id, task_title)): Path<(i64, String)>,
    Json(body): Json<TaskUpdateRequest>,
) -> ApiResult<Json<Value>> {
    let outcome = tokio::task::spawn_blocking(move || {
        let mut conn = db::init_db()?;
        AnalysisRepository::set_task_completion(&mut conn, meeting_id, &task_title, body.completed)
    })
    .await
    .map_err(|_| ApiError::internal("Storage task failed"))??;

    match outcome {
        TaskUpdate::Updated => Ok(Json(json!({ "success": true }))),
        TaskUpdate::MeetingNotFound => Err(ApiError::not_found("Meeting not found")),
    }
}

/// GET /api/meet/recent-activity/:user_id — latest two analyses.
async fn recent_activity(Path(user_id): Path<String>) -> ApiResult<Json<Value>> {
    let meetings = tokio::task::spawn_blocking(move || {
        let conn = db::init_db()?;
        AnalysisRepository::list_by_user(&conn, &user_id, Some(2))
    })
    .await
    .map_err(|_| ApiError::internal("Storage task failed"))??;

    let activity: Vec<Value> = meetings
        .iter()
        .map(|m| json!({ "id": m.id, "title": m.title, "source": m.source }))
        .collect();

    Ok(Json(json!({ "activity": activity })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddMeetingRequest {
    user_id: String,
    meeting_title: String,
    #[serde(default)]
    meeting_description: String,
    meeting_link: String,
    meeting_type: String,
    /// ISO-8601 instant.
    meeting_date_time: String,
}

/// POST /api/meet/add-meeting — create a scheduled/live entry.
async fn add_meeting(Json(body): Json<AddMeetingRequest>) -> ApiResult<Json<Value>> {
    let date_time = chrono::DateTime::parse_from_rfc3339(&body.meeting_date_time)
        .map_err(|_| ApiError::bad_request("meetingDateTime must be an ISO-8601 instant"))?
        .timestamp_millis();

    let entry = NewUpcomingMeeting {
        user_id: body.user_id,
        meeting_title: body.meeting_title,
        meeting_description: body.meeting_description,
        meeting_link: body.meeting_link,
        meeting_type: body.meeting_type,
        date_time,
        created_at: chrono::Utc::now().timestamp_millis(),
    };

    let id = tokio::task::spawn_blocking(move || {
        let conn = db::init_db()?;
        UpcomingRepository::insert(&conn, &entry)
    })
    .await
    .map_err(|_| ApiError::internal("Storage task failed"))??;

    Ok(Json(json!({ "success": true, "id": id })))
}

/// GET /api/meet/:user_id/all-upcoming-meetings — ascending by dateTime.
async fn all_upcoming_meetings(Path(user_id): Path<String>) -> ApiResult<Json<Value>> {
    let meetings = tokio::task::spawn_blocking(move || {
        let conn = db::init_db()?;
        UpcomingRepository::list_by_user(&conn, &user_id)
    })
    .await
    .map_err(|_| ApiError::internal("Storage task failed"))??;

    Ok(Json(json!({ "meetings": meetings })))
}

/// GET /api/meet/upcoming-meetings/:user_id — next two future entries.
async fn next_upcoming_meetings(Path(user_id): Path<String>) -> ApiResult<Json<Value>> {
    let now_ms = chrono::Utc::now().timestamp_millis();
    let meetings = tokio::task::spawn_blocking(move || {
        let conn = db::init_db()?;
        UpcomingRepository::next_for_user(&conn, &user_id, now_ms, 2)
    })
    .await
    .map_err(|_| ApiError::internal("Storage task failed"))??;

    Ok(Json(json!({ "meetings": meetings })))
}

/// GET /api/meet/upcoming-meet-details/:id
async fn upcoming_meeting_details(Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    let meeting = tokio::task::spawn_blocking(move || {
        let conn = db::init_db()?;
        UpcomingRepository::get(&conn, id)
    })
    .await
    .map_err(|_| ApiError::internal("Storage task failed"))??;

    match meeting {
        Some(m) => Ok(Json(json!(m))),
        None => Err(ApiError::not_found("Upcoming meeting not found")),
    }
}
