use crate::api::{with_conn, ApiError, ApiResponse};
use crate::AppState;
use axum::extract::{Extension, Json};
use dispatch_records::{dashboard_stats, DashboardStats};
use std::sync::Arc;

/// Handler for `GET /api/dashboard/stats`.
pub async fn dashboard_stats_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<ApiResponse<DashboardStats>>, ApiError> {
    let stats = with_conn(&state.pool, dashboard_stats).await?;
    Ok(ApiResponse::ok(stats))
}
