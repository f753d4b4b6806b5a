//! User statistics routes under `/api/user`.

use axum::{extract::Path, response::Json, routing::get, Router};

use crate::api::error::{ApiError, ApiResult};
use crate::db::{self, stats, UserStats};

pub fn router() -> Router {
    Router::new().route("/:user_id/stats", get(user_stats))
}

/// GET /api/user/:user_id/stats — scheduled/analyzed/task counts.
async fn user_stats(Path(user_id): Path<String>) -> ApiResult<Json<UserStats>> {
    let stats = tokio::task::spawn_blocking(move || {
        let conn = db::init_db()?;
        stats::user_stats(&conn, &user_id)
    })
    .await
    .map_err(|_| ApiError::internal("Storage task failed"))??;

    Ok(Json(stats))
}
