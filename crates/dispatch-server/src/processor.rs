//! Call lifecycle processing.
//!
//! Turns provider webhook events into call status changes and, when a call
//! ends, fetches its transcript, extracts structured data, and writes exactly
//! one result row.

use chrono::{DateTime, SecondsFormat, Utc};
use dispatch_db::DbPool;
use dispatch_extract::{Extraction, TranscriptExtractor};
use dispatch_records::{
    apply_final_transcript, find_call_by_provider_id, find_result_for_call, get_agent_config,
    mark_call_in_progress, record_completion, CallResult, CompletedCall, NewCallResult,
    RecordError, TranscriptUpdate,
};
use dispatch_types::ProcessingStatus;
use dispatch_voice::{CallProvider, VoiceError};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

/// A provider webhook event, reduced to what processing needs.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    CallStarted,
    CallEnded,
    CallAnalyzed { transcript: Option<String> },
    Other { event_type: String },
}

impl WebhookEvent {
    /// Classifies a webhook by its `event` field; `data` is the call object.
    pub fn parse(event_type: &str, data: &Value) -> Self {
        match event_type {
            "call_started" => Self::CallStarted,
            "call_ended" => Self::CallEnded,
            "call_analyzed" => Self::CallAnalyzed {
                transcript: data
                    .get("transcript")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            other => Self::Other {
                event_type: other.to_string(),
            },
        }
    }

    pub fn event_type(&self) -> &str {
        match self {
            Self::CallStarted => "call_started",
            Self::CallEnded => "call_ended",
            Self::CallAnalyzed { .. } => "call_analyzed",
            Self::Other { event_type } => event_type,
        }
    }
}

/// Result of completing a call.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    /// A result was written and the call moved to `completed`.
    Completed(CallResult),
    /// The call already had a result; nothing was fetched or written.
    AlreadyCompleted,
}

/// What [`CallProcessor::handle_event`] did with an event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// The call moved from `initiated` to `in_progress`.
    Started,
    /// The call was already past `initiated`; status left as is.
    StatusUnchanged,
    Completed(CompletionOutcome),
    TranscriptUpdated,
    /// The call has no result yet; the transcript is parked and copied onto
    /// the result when the call completes.
    TranscriptDeferred,
    /// No call matches the provider call id.
    UnknownCall,
    Ignored,
}

impl EventOutcome {
    /// Short label recorded on the delivery row.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::StatusUnchanged => "status_unchanged",
            Self::Completed(CompletionOutcome::Completed(_)) => "completed",
            Self::Completed(CompletionOutcome::AlreadyCompleted) => "already_completed",
            Self::TranscriptUpdated => "transcript_updated",
            Self::TranscriptDeferred => "transcript_deferred",
            Self::UnknownCall => "unknown_call",
            Self::Ignored => "ignored",
        }
    }
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("provider error: {0}")]
    Provider(#[from] VoiceError),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RecordError> for ProcessError {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::NotFound { .. } => ProcessError::NotFound(e.to_string()),
            other => ProcessError::Storage(other.to_string()),
        }
    }
}

/// Reconciles provider call events into persisted state.
pub struct CallProcessor {
    pool: DbPool,
    provider: Arc<dyn CallProvider>,
    extractor: Arc<dyn TranscriptExtractor>,
}

impl CallProcessor {
    pub fn new(
        pool: DbPool,
        provider: Arc<dyn CallProvider>,
        extractor: Arc<dyn TranscriptExtractor>,
    ) -> Self {
        Self {
            pool,
            provider,
            extractor,
        }
    }

    /// Runs `f` against a pooled connection on the blocking thread pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, ProcessError>
    where
        F: FnOnce(&Connection) -> Result<T, RecordError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool
                .get()
                .map_err(|e| ProcessError::Storage(format!("db connection failed: {}", e)))?;
            f(&conn).map_err(ProcessError::from)
        })
        .await
        .map_err(|e| ProcessError::Storage(format!("task join error: {}", e)))?
    }

    pub async fn handle_event(
        &self,
        provider_call_id: &str,
        event: WebhookEvent,
    ) -> Result<EventOutcome, ProcessError> {
        match event {
            WebhookEvent::CallStarted => {
                let id = provider_call_id.to_string();
                self.with_conn(move |conn| {
                    let Some(call) = find_call_by_provider_id(conn, &id)? else {
                        return Ok(EventOutcome::UnknownCall);
                    };
                    if mark_call_in_progress(conn, &call.id)? {
                        Ok(EventOutcome::Started)
                    } else {
                        Ok(EventOutcome::StatusUnchanged)
                    }
                })
                .await
            }
            WebhookEvent::CallEnded => self
                .complete_call(provider_call_id)
                .await
                .map(EventOutcome::Completed),
            WebhookEvent::CallAnalyzed { transcript } => {
                let Some(transcript) = transcript.filter(|t| !t.trim().is_empty()) else {
                    return Ok(EventOutcome::Ignored);
                };
                let id = provider_call_id.to_string();
                self.with_conn(move |conn| {
                    let Some(call) = find_call_by_provider_id(conn, &id)? else {
                        return Ok(EventOutcome::UnknownCall);
                    };
                    match apply_final_transcript(conn, &call.id, &transcript)? {
                        TranscriptUpdate::Applied => Ok(EventOutcome::TranscriptUpdated),
                        TranscriptUpdate::Deferred => Ok(EventOutcome::TranscriptDeferred),
                    }
                })
                .await
            }
            WebhookEvent::Other { event_type } => {
                tracing::debug!(provider_call_id, %event_type, "ignoring webhook event");
                Ok(EventOutcome::Ignored)
            }
        }
    }

    /// Finalises a call: fetches the transcript from the provider, extracts
    /// structured data, and writes the single result row.
    ///
    /// Calling this again for a call that already has a result makes no
    /// external requests and returns [`CompletionOutcome::AlreadyCompleted`].
    pub async fn complete_call(
        &self,
        provider_call_id: &str,
    ) -> Result<CompletionOutcome, ProcessError> {
        let id = provider_call_id.to_string();
        let lookup = self
            .with_conn(move |conn| {
                let Some(call) = find_call_by_provider_id(conn, &id)? else {
                    return Ok(None);
                };
                if find_result_for_call(conn, &call.id)?.is_some() {
                    return Ok(Some((call, None)));
                }
                let config = get_agent_config(conn, &call.agent_config_id)?;
                Ok(Some((call, Some(config))))
            })
            .await?;

        let (call, config) = match lookup {
            None => {
                return Err(ProcessError::NotFound(format!(
                    "call with provider id {}",
                    provider_call_id
                )))
            }
            Some((_, None)) => {
                tracing::debug!(provider_call_id, "call already has a result");
                return Ok(CompletionOutcome::AlreadyCompleted);
            }
            Some((call, Some(config))) => (call, config),
        };

        let details = self.provider.get_call(provider_call_id).await?;

        let result = match details.non_empty_transcript() {
            None => {
                tracing::warn!(call_id = %call.id, "provider returned no transcript");
                NewCallResult::from_structured_data(
                    json!({
                        "call_outcome": "No Transcript Available",
                        "processing_error": "provider returned no transcript for the call",
                    }),
                    None,
                    ProcessingStatus::Unprocessed,
                )
            }
            Some(transcript) => {
                let extraction = self
                    .extractor
                    .extract(transcript, config.scenario_type.as_str())
                    .await;
                let status = match &extraction {
                    Extraction::Extracted(_) => ProcessingStatus::Processed,
                    Extraction::Degraded { reason, .. } => {
                        tracing::warn!(call_id = %call.id, %reason, "storing degraded result");
                        ProcessingStatus::Degraded
                    }
                };
                NewCallResult::from_structured_data(
                    extraction.into_data(),
                    Some(transcript.to_string()),
                    status,
                )
            }
        };

        let completed = CompletedCall {
            ended_at: details
                .end_timestamp
                .as_ref()
                .and_then(parse_timestamp)
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true)),
            duration: compute_duration(
                details.start_timestamp.as_ref(),
                details.end_timestamp.as_ref(),
            ),
            result,
        };

        let call_id = call.id.clone();
        let written = self
            .with_conn(move |conn| record_completion(conn, &call_id, &completed))
            .await?;

        match written {
            Some(result) => {
                tracing::info!(
                    call_id = %call.id,
                    provider_call_id,
                    processing_status = %result.processing_status,
                    "call completed"
                );
                Ok(CompletionOutcome::Completed(result))
            }
            None => Ok(CompletionOutcome::AlreadyCompleted),
        }
    }
}

/// Parses a provider timestamp: epoch milliseconds (number or numeric
/// string) or an RFC 3339 string.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(DateTime::from_timestamp_millis),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(millis) = s.parse::<i64>() {
                return DateTime::from_timestamp_millis(millis);
            }
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|t| t.with_timezone(&Utc))
        }
        _ => None,
    }
}

/// Whole seconds between two provider timestamps.
///
/// `None` when either is missing or unparsable, or when the end precedes the
/// start.
pub fn compute_duration(start: Option<&Value>, end: Option<&Value>) -> Option<i64> {
    let start = parse_timestamp(start?)?;
    let end = parse_timestamp(end?)?;
    let seconds = (end - start).num_seconds();
    (seconds >= 0).then_some(seconds)
}
