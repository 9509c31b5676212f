//! Persistence gateway for the dispatch backend.
//!
//! Table-scoped CRUD over the SQLite schema owned by `dispatch-db`:
//!
//! | Module | Table | Purpose |
//! |--------|-------|---------|
//! | [`agent_config`] | `agent_configs` | voice agent scripts and tuning |
//! | [`call`] | `calls` | one row per placed call, forward-only status |
//! | [`call_result`] | `call_results` | structured data, at most one per call |
//! | [`webhook`] | `webhook_deliveries` | dedup log of provider webhooks |
//! | [`stats`] | (aggregate) | dashboard counts and recent calls |
//!
//! Every function takes a borrowed [`rusqlite::Connection`] and performs
//! blocking I/O; async callers run them inside `spawn_blocking`.

pub mod agent_config;
pub mod call;
pub mod call_result;
mod error;
pub mod stats;
pub mod webhook;

pub use agent_config::{
    create_agent_config, delete_agent_config, get_agent_config, list_agent_configs,
    update_agent_config, AgentConfig, AgentConfigUpdate, NewAgentConfig,
};
pub use call::{
    create_call, find_call_by_provider_id, get_call, get_call_summary, list_calls,
    mark_call_failed, mark_call_in_progress, record_completion, set_provider_call_id, Call,
    CallListItem, CallSummary, CompletedCall, NewCall,
};
pub use call_result::{
    apply_final_transcript, find_result_for_call, get_result_for_call, CallResult,
    NewCallResult, TranscriptUpdate,
};
pub use error::RecordError;
pub use stats::{dashboard_stats, DashboardStats, RecentCall, StatusCounts};
pub use webhook::{
    list_deliveries, mark_delivery, record_delivery, DeliveryDisposition, DeliveryFilter,
    NewDelivery, WebhookDelivery,
};

use dispatch_types::ParseLabelError;
use std::str::FromStr;

/// Current UTC time as an RFC 3339 string with millisecond precision.
///
/// All timestamp columns use this format so that lexical ordering matches
/// chronological ordering.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// A fresh random row identifier.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Parses a label column inside a row mapper, reporting a conversion failure
/// against the column index on unknown labels.
pub(crate) fn label_column<T>(idx: usize, value: String) -> rusqlite::Result<T>
where
    T: FromStr<Err = ParseLabelError>,
{
    value.parse().map_err(|e: ParseLabelError| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Parses a JSON text column inside a row mapper.
pub(crate) fn json_column<T>(idx: usize, value: String) -> rusqlite::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_str(&value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[cfg(test)]
mod tests;
