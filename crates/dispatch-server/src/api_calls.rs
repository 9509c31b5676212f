//! Call start and call query handlers.

use crate::api::{with_conn, ApiError, ApiResponse};
use crate::AppState;
use axum::extract::{Extension, Json, Path, Query};
use dispatch_records::{
    create_call, get_agent_config, get_call_summary, get_result_for_call, list_calls,
    mark_call_failed, set_provider_call_id, CallListItem, CallResult, CallSummary, NewCall,
};
use dispatch_voice::{CallContext, CallRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request body for `POST /api/calls/start`.
#[derive(Debug, Deserialize)]
pub struct StartCallRequest {
    pub agent_config_id: String,
    pub driver_name: String,
    /// Omit for an in-browser web call.
    #[serde(default)]
    pub driver_phone: Option<String>,
    pub load_number: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    Phone,
    Web,
}

/// Response body for a started call.
#[derive(Debug, Serialize, Deserialize)]
pub struct StartCallResponse {
    pub call_id: String,
    pub provider_call_id: String,
    pub call_type: CallType,
    /// Session token for the browser client; web calls only.
    pub access_token: Option<String>,
    pub agent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListCallsParams {
    pub limit: Option<u32>,
}

/// Handler for `POST /api/calls/start`.
///
/// The agent config is checked before anything is written or any provider
/// request is made. A provider failure marks the new call `failed`.
pub async fn start_call_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<StartCallRequest>,
) -> Result<Json<ApiResponse<StartCallResponse>>, ApiError> {
    if payload.driver_name.trim().is_empty() {
        return Err(ApiError::BadRequest("driver_name must not be empty".to_string()));
    }
    if payload.load_number.trim().is_empty() {
        return Err(ApiError::BadRequest("load_number must not be empty".to_string()));
    }
    let driver_phone = payload
        .driver_phone
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());

    let new_call = NewCall {
        agent_config_id: payload.agent_config_id,
        driver_name: payload.driver_name,
        driver_phone: driver_phone.clone(),
        load_number: payload.load_number,
    };

    let (agent_config, call) = with_conn(&state.pool, move |conn| {
        let config = get_agent_config(conn, &new_call.agent_config_id)?;
        let call = create_call(conn, &new_call)?;
        Ok((config, call))
    })
    .await?;

    let request = CallRequest {
        context: CallContext {
            driver_name: call.driver_name.clone(),
            load_number: call.load_number.clone(),
        },
        agent_config,
        llm_websocket_url: state.llm_websocket_url.clone(),
    };

    let (call_type, created) = match &driver_phone {
        Some(phone) => (
            CallType::Phone,
            state.provider.create_phone_call(phone, &request).await,
        ),
        None => (CallType::Web, state.provider.create_web_call(&request).await),
    };

    let created = match created {
        Ok(created) => created,
        Err(e) => {
            tracing::error!(call_id = %call.id, error = %e, "provider call creation failed");
            let call_id = call.id.clone();
            with_conn(&state.pool, move |conn| mark_call_failed(conn, &call_id)).await?;
            return Err(ApiError::Upstream(format!("failed to create call: {}", e)));
        }
    };

    let call_id = call.id.clone();
    let provider_call_id = created.call_id.clone();
    with_conn(&state.pool, move |conn| {
        set_provider_call_id(conn, &call_id, &provider_call_id)
    })
    .await?;

    tracing::info!(
        call_id = %call.id,
        provider_call_id = %created.call_id,
        call_type = ?call_type,
        "call started"
    );

    Ok(ApiResponse::ok(StartCallResponse {
        call_id: call.id,
        provider_call_id: created.call_id,
        call_type,
        access_token: created.access_token,
        agent_id: created.agent_id,
    }))
}

/// Handler for `GET /api/calls`.
pub async fn list_calls_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<ListCallsParams>,
) -> Result<Json<ApiResponse<Vec<CallListItem>>>, ApiError> {
    let calls = with_conn(&state.pool, move |conn| list_calls(conn, params.limit)).await?;
    Ok(ApiResponse::ok(calls))
}

/// Handler for `GET /api/calls/{id}`.
pub async fn get_call_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<CallSummary>>, ApiError> {
    let summary = with_conn(&state.pool, move |conn| get_call_summary(conn, &id)).await?;
    Ok(ApiResponse::ok(summary))
}

/// Handler for `GET /api/calls/{id}/results`.
pub async fn get_call_results_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<CallResult>>, ApiError> {
    let result = with_conn(&state.pool, move |conn| get_result_for_call(conn, &id)).await?;
    Ok(ApiResponse::ok(result))
}
