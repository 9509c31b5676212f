use crate::api::{ApiError, ApiResponse};
use crate::AppState;
use axum::extract::{Extension, Json};
use serde_json::Value;
use std::sync::Arc;

/// Handler for `GET /api/provider/agents`. Passes the provider's agent list
/// through unchanged.
pub async fn list_provider_agents_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let agents = state.provider.list_agents().await.map_err(|e| {
        tracing::warn!(error = %e, "failed to list provider agents");
        ApiError::Upstream(format!("failed to list agents: {}", e))
    })?;
    Ok(ApiResponse::ok(agents))
}
