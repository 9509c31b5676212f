//! Provider webhook receiver and delivery log.

use crate::api::{with_conn, ApiError, ApiResponse};
use crate::processor::WebhookEvent;
use crate::webhook_queue::QueuedDelivery;
use crate::AppState;
use axum::extract::{Extension, Json, Query};
use dispatch_records::{
    list_deliveries, mark_delivery, record_delivery, DeliveryDisposition, DeliveryFilter,
    NewDelivery, WebhookDelivery,
};
use dispatch_types::DeliveryStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Queued,
    Requeued,
    Duplicate,
}

/// Acknowledgement returned to the provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookReceipt {
    pub delivery_id: i64,
    pub status: ReceiptStatus,
}

/// Handler for `POST /api/retell-webhook`.
///
/// Accepts `{"event": ..., "data": {...}}` or `{"event": ..., "call": {...}}`.
/// The delivery is recorded and queued; processing happens in the webhook
/// worker.
pub async fn receive_webhook_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<ApiResponse<WebhookReceipt>>, ApiError> {
    let event_type = body
        .get("event")
        .and_then(Value::as_str)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing event".to_string()))?
        .to_string();
    let data = body
        .get("data")
        .filter(|d| d.is_object())
        .or_else(|| body.get("call"))
        .cloned()
        .unwrap_or(Value::Null);
    let provider_call_id = data
        .get("call_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing call_id".to_string()))?
        .to_string();

    let event = WebhookEvent::parse(&event_type, &data);
    let new = NewDelivery {
        provider_call_id: provider_call_id.clone(),
        event_type: event_type.clone(),
        payload: body,
    };

    let disposition = with_conn(&state.pool, move |conn| record_delivery(conn, &new)).await?;
    let delivery_id = disposition.id();

    let status = match disposition {
        DeliveryDisposition::Duplicate { status, .. } => {
            tracing::info!(
                delivery_id,
                %provider_call_id,
                %event_type,
                previous_status = %status,
                "duplicate webhook acknowledged"
            );
            ReceiptStatus::Duplicate
        }
        DeliveryDisposition::Accepted(_) | DeliveryDisposition::Requeued(_) => {
            let queued = QueuedDelivery {
                delivery_id,
                provider_call_id: provider_call_id.clone(),
                event,
            };
            if let Err(e) = state.webhook_queue.try_enqueue(queued) {
                tracing::warn!(delivery_id, %provider_call_id, error = %e, "webhook not queued");
                let detail = e.to_string();
                with_conn(&state.pool, move |conn| {
                    mark_delivery(conn, delivery_id, DeliveryStatus::Failed, Some(&detail))
                })
                .await?;
                return Err(ApiError::ServiceUnavailable(e.to_string()));
            }
            tracing::debug!(delivery_id, %provider_call_id, %event_type, "webhook queued");
            if matches!(disposition, DeliveryDisposition::Requeued(_)) {
                ReceiptStatus::Requeued
            } else {
                ReceiptStatus::Queued
            }
        }
    };

    Ok(ApiResponse::ok(WebhookReceipt {
        delivery_id,
        status,
    }))
}

/// Handler for `GET /api/webhook-deliveries`.
pub async fn list_deliveries_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(filter): Query<DeliveryFilter>,
) -> Result<Json<ApiResponse<Vec<WebhookDelivery>>>, ApiError> {
    let deliveries = with_conn(&state.pool, move |conn| list_deliveries(conn, &filter)).await?;
    Ok(ApiResponse::ok(deliveries))
}
