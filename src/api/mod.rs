//! REST API server.
//!
//! Provides HTTP endpoints for:
//! - Live-meeting capture and recording analysis
//! - Analyzed meeting and task queries
//! - Scheduled/upcoming meeting management
//! - Per-user statistics

pub mod error;
pub mod routes;

use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tracing::info;

pub use routes::meet::MeetState;

pub struct ApiServer {
    host: String,
    port: u16,
    meet_state: MeetState,
}

impl ApiServer {
    pub fn new(host: String, port: u16, meet_state: MeetState) -> Self {
        Self {
            host,
            port,
            meet_state,
        }
    }

    pub async fn start(self) -> Result<()> {
        let app = Router::new()
            .route("/", get(status))
            .route("/version", get(version))
            .nest("/api/meet", routes::meet::router(self.meet_state))
            .nest("/api/user", routes::stats::router())
            .layer(ServiceBuilder::new());

        let listener =
            tokio::net::TcpListener::bind(&format!("{}:{}", self.host, self.port)).await?;

        info!("API server listening on http://{}:{}", self.host, self.port);
        info!("Endpoints:");
        info!("  GET   /                                      - Service info");
        info!("  POST  /api/meet/record                       - Capture + analyze a live meeting");
        info!("  POST  /api/meet/analyze                      - Analyze an upload or shared link");
        info!("  GET   /api/meet/:uid/completed-meetings      - List analyzed meetings");
        info!("  GET   /api/meet/meetings/:id                 - Fetch one analyzed meeting");
        info!("  GET   /api/meet/my-meetings                  - Analyzed meetings (header scoped)");
        info!("  GET   /api/meet/tasks                        - All tasks (header scoped)");
        info!("  PATCH /api/meet/tasks/:id/:title             - Toggle task completion");
        info!("  GET   /api/meet/recent-activity/:uid         - Two latest analyses");
        info!("  POST  /api/meet/add-meeting                  - Schedule a meeting");
        info!("  GET   /api/meet/:uid/all-upcoming-meetings   - All scheduled meetings");
        info!("  GET   /api/meet/upcoming-meetings/:uid       - Next two future meetings");
        info!("  GET   /api/meet/upcoming-meet-details/:id    - One scheduled meeting");
        info!("  GET   /api/user/:uid/stats                   - Aggregate counts");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "meetscribe",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "meetscribe"
    }))
}
