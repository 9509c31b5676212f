//! Webhook delivery log.
//!
//! Every provider webhook is recorded under a dedup key of
//! `provider_call_id:event_type` before it is processed. A repeated key is a
//! duplicate unless the earlier attempt failed, in which case it is re-queued.

use dispatch_types::DeliveryStatus;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RecordError;
use crate::{json_column, label_column, now_timestamp};

/// Default page size for [`list_deliveries`].
const DEFAULT_LIST_LIMIT: u32 = 50;

/// Hard upper bound on the page size for [`list_deliveries`].
const MAX_LIST_LIMIT: u32 = 500;

/// A webhook as received, before it is recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDelivery {
    pub provider_call_id: String,
    pub event_type: String,
    pub payload: Value,
}

impl NewDelivery {
    pub fn dedup_key(&self) -> String {
        format!("{}:{}", self.provider_call_id, self.event_type)
    }
}

/// A recorded webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookDelivery {
    pub id: i64,
    pub dedup_key: String,
    pub provider_call_id: String,
    pub event_type: String,
    pub payload: Value,
    pub status: DeliveryStatus,
    /// Outcome or error description written by the worker.
    pub detail: Option<String>,
    pub attempts: u32,
    pub received_at: String,
    pub processed_at: Option<String>,
}

/// What [`record_delivery`] did with an incoming webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryDisposition {
    /// First time this key was seen; process it.
    Accepted(i64),
    /// The key's previous attempt failed; process it again.
    Requeued(i64),
    /// The key is already queued or processed; acknowledge only.
    Duplicate { id: i64, status: DeliveryStatus },
}

impl DeliveryDisposition {
    /// The delivery row this webhook maps to.
    pub fn id(self) -> i64 {
        match self {
            Self::Accepted(id) | Self::Requeued(id) | Self::Duplicate { id, .. } => id,
        }
    }

    /// Whether the webhook should be handed to the worker.
    pub fn should_process(self) -> bool {
        !matches!(self, Self::Duplicate { .. })
    }
}

/// Query filter for [`list_deliveries`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryFilter {
    pub status: Option<DeliveryStatus>,
    pub limit: Option<u32>,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<WebhookDelivery> {
    Ok(WebhookDelivery {
        id: row.get(0)?,
        dedup_key: row.get(1)?,
        provider_call_id: row.get(2)?,
        event_type: row.get(3)?,
        payload: json_column(4, row.get(4)?)?,
        status: label_column(5, row.get(5)?)?,
        detail: row.get(6)?,
        attempts: row.get(7)?,
        received_at: row.get(8)?,
        processed_at: row.get(9)?,
    })
}

/// Records a webhook under its dedup key and decides whether it needs
/// processing.
pub fn record_delivery(
    conn: &Connection,
    new: &NewDelivery,
) -> Result<DeliveryDisposition, RecordError> {
    let key = new.dedup_key();
    let payload_json = serde_json::to_string(&new.payload)?;
    let tx = conn.unchecked_transaction()?;

    let inserted = tx.execute(
        "INSERT INTO webhook_deliveries (
            dedup_key, provider_call_id, event_type, payload_json, status, received_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT (dedup_key) DO NOTHING",
        params![
            key,
            new.provider_call_id,
            new.event_type,
            payload_json,
            DeliveryStatus::Queued.as_str(),
            now_timestamp(),
        ],
    )?;

    if inserted == 1 {
        let id = tx.last_insert_rowid();
        tx.commit()?;
        return Ok(DeliveryDisposition::Accepted(id));
    }

    let (id, status): (i64, String) = tx.query_row(
        "SELECT id, status FROM webhook_deliveries WHERE dedup_key = ?1",
        [&key],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let status: DeliveryStatus = status.parse()?;

    let disposition = match status {
        DeliveryStatus::Failed => {
            tx.execute(
                "UPDATE webhook_deliveries
                 SET status = ?1, payload_json = ?2, attempts = attempts + 1,
                     detail = NULL, received_at = ?3, processed_at = NULL
                 WHERE id = ?4",
                params![
                    DeliveryStatus::Queued.as_str(),
                    payload_json,
                    now_timestamp(),
                    id,
                ],
            )?;
            DeliveryDisposition::Requeued(id)
        }
        status => DeliveryDisposition::Duplicate { id, status },
    };

    tx.commit()?;
    Ok(disposition)
}

/// Records the worker's outcome for a delivery.
pub fn mark_delivery(
    conn: &Connection,
    id: i64,
    status: DeliveryStatus,
    detail: Option<&str>,
) -> Result<(), RecordError> {
    let changed = conn.execute(
        "UPDATE webhook_deliveries SET status = ?1, detail = ?2, processed_at = ?3
         WHERE id = ?4",
        params![status.as_str(), detail, now_timestamp(), id],
    )?;
    if changed == 0 {
        return Err(RecordError::not_found("webhook delivery", id.to_string()));
    }
    Ok(())
}

/// Lists deliveries newest first, optionally filtered by status.
pub fn list_deliveries(
    conn: &Connection,
    filter: &DeliveryFilter,
) -> Result<Vec<WebhookDelivery>, RecordError> {
    let limit = filter
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let mut sql = String::from(
        "SELECT id, dedup_key, provider_call_id, event_type, payload_json, status,
                detail, attempts, received_at, processed_at
         FROM webhook_deliveries",
    );
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(status) = filter.status {
        values.push(Box::new(status.as_str()));
        sql.push_str(&format!(" WHERE status = ?{}", values.len()));
    }
    values.push(Box::new(limit));
    sql.push_str(&format!(" ORDER BY id DESC LIMIT ?{}", values.len()));

    let params_refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| &**v).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_refs.as_slice(), map_row)?;
    let mut deliveries = Vec::new();
    for row in rows {
        deliveries.push(row?);
    }
    Ok(deliveries)
}
