//! Agent configuration CRUD handlers.

use crate::api::{with_conn, ApiError, ApiResponse};
use crate::AppState;
use axum::extract::{Extension, Json, Path};
use dispatch_records::{
    create_agent_config, delete_agent_config, get_agent_config, list_agent_configs,
    update_agent_config, AgentConfig, AgentConfigUpdate, NewAgentConfig,
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct DeletedConfig {
    pub id: String,
}

/// Handler for `GET /api/agent-configs`.
pub async fn list_configs_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<AgentConfig>>>, ApiError> {
    let configs = with_conn(&state.pool, list_agent_configs).await?;
    Ok(ApiResponse::ok(configs))
}

/// Handler for `POST /api/agent-configs`.
pub async fn create_config_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<NewAgentConfig>,
) -> Result<Json<ApiResponse<AgentConfig>>, ApiError> {
    payload.validate().map_err(ApiError::BadRequest)?;

    let config = with_conn(&state.pool, move |conn| create_agent_config(conn, &payload)).await?;
    tracing::info!(agent_config_id = %config.id, name = %config.name, "agent config created");
    Ok(ApiResponse::ok(config))
}

/// Handler for `GET /api/agent-configs/{id}`.
pub async fn get_config_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<AgentConfig>>, ApiError> {
    let config = with_conn(&state.pool, move |conn| get_agent_config(conn, &id)).await?;
    Ok(ApiResponse::ok(config))
}

/// Handler for `PUT /api/agent-configs/{id}`.
pub async fn update_config_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<AgentConfigUpdate>,
) -> Result<Json<ApiResponse<AgentConfig>>, ApiError> {
    payload.validate().map_err(ApiError::BadRequest)?;

    let config =
        with_conn(&state.pool, move |conn| update_agent_config(conn, &id, &payload)).await?;
    Ok(ApiResponse::ok(config))
}

/// Handler for `DELETE /api/agent-configs/{id}`.
pub async fn delete_config_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<DeletedConfig>>, ApiError> {
    let deleted_id = id.clone();
    with_conn(&state.pool, move |conn| delete_agent_config(conn, &id)).await?;
    tracing::info!(agent_config_id = %deleted_id, "agent config deleted");
    Ok(ApiResponse::ok(DeletedConfig { id: deleted_id }))
}
