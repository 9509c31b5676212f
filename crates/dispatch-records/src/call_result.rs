//! Structured results extracted from call transcripts.

use dispatch_types::ProcessingStatus;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RecordError;
use crate::{json_column, label_column};

pub(crate) const SELECT_COLUMNS: &str = "r.id, r.call_id, r.call_outcome, r.driver_status,
    r.current_location, r.eta, r.emergency_type, r.emergency_location,
    r.escalation_status, r.raw_transcript, r.structured_data_json,
    r.processing_status, r.created_at";

/// The stored outcome of a completed call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallResult {
    pub id: String,
    pub call_id: String,
    pub call_outcome: Option<String>,
    pub driver_status: Option<String>,
    pub current_location: Option<String>,
    pub eta: Option<String>,
    pub emergency_type: Option<String>,
    pub emergency_location: Option<String>,
    pub escalation_status: Option<String>,
    pub raw_transcript: Option<String>,
    /// The full object returned by extraction (or its fallback).
    pub structured_data: Value,
    pub processing_status: ProcessingStatus,
    pub created_at: String,
}

/// Fields of a result row before it is attached to a call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewCallResult {
    pub call_outcome: Option<String>,
    pub driver_status: Option<String>,
    pub current_location: Option<String>,
    pub eta: Option<String>,
    pub emergency_type: Option<String>,
    pub emergency_location: Option<String>,
    pub escalation_status: Option<String>,
    pub raw_transcript: Option<String>,
    pub structured_data: Value,
    pub processing_status: ProcessingStatus,
}

impl NewCallResult {
    /// Builds a result from an extracted object, lifting the well-known
    /// string fields into their own columns.
    ///
    /// Missing, null, or non-string fields become `None`; the full object is
    /// kept in `structured_data` regardless.
    pub fn from_structured_data(
        structured_data: Value,
        raw_transcript: Option<String>,
        processing_status: ProcessingStatus,
    ) -> Self {
        let field = |name: &str| {
            structured_data
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Self {
            call_outcome: field("call_outcome"),
            driver_status: field("driver_status"),
            current_location: field("current_location"),
            eta: field("eta"),
            emergency_type: field("emergency_type"),
            emergency_location: field("emergency_location"),
            escalation_status: field("escalation_status"),
            raw_transcript,
            structured_data,
            processing_status,
        }
    }
}

/// Maps a result row whose columns start at `offset` (see [`SELECT_COLUMNS`]).
pub(crate) fn map_row_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<CallResult> {
    Ok(CallResult {
        id: row.get(offset)?,
        call_id: row.get(offset + 1)?,
        call_outcome: row.get(offset + 2)?,
        driver_status: row.get(offset + 3)?,
        current_location: row.get(offset + 4)?,
        eta: row.get(offset + 5)?,
        emergency_type: row.get(offset + 6)?,
        emergency_location: row.get(offset + 7)?,
        escalation_status: row.get(offset + 8)?,
        raw_transcript: row.get(offset + 9)?,
        structured_data: json_column(offset + 10, row.get(offset + 10)?)?,
        processing_status: label_column(offset + 11, row.get(offset + 11)?)?,
        created_at: row.get(offset + 12)?,
    })
}

/// Returns the result for a call, if one has been written.
pub fn find_result_for_call(
    conn: &Connection,
    call_id: &str,
) -> Result<Option<CallResult>, RecordError> {
    let result = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM call_results r WHERE r.call_id = ?1"),
            [call_id],
            |row| map_row_at(row, 0),
        )
        .optional()?;
    Ok(result)
}

/// Returns the result for a call, or `NotFound` if none exists.
pub fn get_result_for_call(conn: &Connection, call_id: &str) -> Result<CallResult, RecordError> {
    find_result_for_call(conn, call_id)?
        .ok_or_else(|| RecordError::not_found("call result", call_id))
}

/// Where a final transcript ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptUpdate {
    /// Written onto the call's existing result.
    Applied,
    /// Parked on the call; [`record_completion`](crate::record_completion)
    /// copies it onto the result when one is written.
    Deferred,
}

/// Records the provider's final transcript for a call.
///
/// Overwrites `raw_transcript` on the call's result, or parks the transcript
/// on the call when no result exists yet. Both branches run in one
/// transaction, so a completion committing concurrently either sees the
/// parked transcript or is overwritten by it.
pub fn apply_final_transcript(
    conn: &Connection,
    call_id: &str,
    transcript: &str,
) -> Result<TranscriptUpdate, RecordError> {
    let tx = conn.unchecked_transaction()?;

    let changed = tx.execute(
        "UPDATE call_results SET raw_transcript = ?1 WHERE call_id = ?2",
        [transcript, call_id],
    )?;
    if changed > 0 {
        tx.commit()?;
        return Ok(TranscriptUpdate::Applied);
    }

    let parked = tx.execute(
        "UPDATE calls SET pending_transcript = ?1 WHERE id = ?2",
        [transcript, call_id],
    )?;
    if parked == 0 {
        return Err(RecordError::not_found("call", call_id));
    }
    tx.commit()?;
    Ok(TranscriptUpdate::Deferred)
}
