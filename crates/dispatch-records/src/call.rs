//! Calls placed to drivers and their lifecycle.
//!
//! Status transitions are guarded in SQL (`WHERE call_status IN (...)`), so a
//! late or duplicated provider event can never move a call backwards.

use dispatch_types::{CallStatus, ScenarioType};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::call_result::{self, CallResult, NewCallResult};
use crate::error::RecordError;
use crate::{label_column, new_id, now_timestamp};

const SELECT_COLUMNS: &str = "c.id, c.agent_config_id, c.provider_call_id, c.driver_name,
    c.driver_phone, c.load_number, c.call_status, c.started_at, c.ended_at, c.duration";

const CALL_COLUMN_COUNT: usize = 10;

/// Prefix of the provider id stored until the provider assigns the real one.
const PENDING_PROVIDER_PREFIX: &str = "pending-";

/// A call placed (or attempted) to a driver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Call {
    pub id: String,
    pub agent_config_id: String,
    /// The provider's identifier; `pending-<id>` until the provider answers.
    pub provider_call_id: String,
    pub driver_name: String,
    /// Absent for in-browser web calls.
    pub driver_phone: Option<String>,
    pub load_number: String,
    pub call_status: CallStatus,
    pub started_at: String,
    pub ended_at: Option<String>,
    /// Whole seconds; `None` when the provider timestamps were incomplete.
    pub duration: Option<i64>,
}

/// Parameters for creating a call row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewCall {
    pub agent_config_id: String,
    pub driver_name: String,
    #[serde(default)]
    pub driver_phone: Option<String>,
    pub load_number: String,
}

/// A call joined with the name and scenario of its agent config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallListItem {
    #[serde(flatten)]
    pub call: Call,
    pub agent_name: Option<String>,
    pub scenario_type: Option<ScenarioType>,
}

/// Everything the dashboard shows for one call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallSummary {
    pub call_info: CallListItem,
    pub results: Option<CallResult>,
}

/// The final state written when a call ends.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedCall {
    pub ended_at: Option<String>,
    pub duration: Option<i64>,
    pub result: NewCallResult,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<Call> {
    Ok(Call {
        id: row.get(0)?,
        agent_config_id: row.get(1)?,
        provider_call_id: row.get(2)?,
        driver_name: row.get(3)?,
        driver_phone: row.get(4)?,
        load_number: row.get(5)?,
        call_status: label_column(6, row.get(6)?)?,
        started_at: row.get(7)?,
        ended_at: row.get(8)?,
        duration: row.get(9)?,
    })
}

fn map_list_row(row: &Row<'_>) -> rusqlite::Result<CallListItem> {
    let scenario: Option<String> = row.get(CALL_COLUMN_COUNT + 1)?;
    Ok(CallListItem {
        call: map_row(row)?,
        agent_name: row.get(CALL_COLUMN_COUNT)?,
        scenario_type: scenario
            .map(|s| label_column(CALL_COLUMN_COUNT + 1, s))
            .transpose()?,
    })
}

/// Inserts a call in `initiated` status with a placeholder provider id.
///
/// Returns `Conflict` if the agent config does not exist.
pub fn create_call(conn: &Connection, new: &NewCall) -> Result<Call, RecordError> {
    let id = new_id();
    let placeholder = format!("{PENDING_PROVIDER_PREFIX}{id}");

    conn.execute(
        "INSERT INTO calls (
            id, agent_config_id, provider_call_id, driver_name, driver_phone,
            load_number, call_status, started_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            new.agent_config_id,
            placeholder,
            new.driver_name,
            new.driver_phone,
            new.load_number,
            CallStatus::Initiated.as_str(),
            now_timestamp(),
        ],
    )
    .map_err(|e| {
        RecordError::from_write(e, || {
            format!("agent config {} does not exist", new.agent_config_id)
        })
    })?;

    tracing::debug!(call_id = %id, agent_config_id = %new.agent_config_id, "created call");
    get_call(conn, &id)
}

/// Retrieves a call by its own ID.
pub fn get_call(conn: &Connection, id: &str) -> Result<Call, RecordError> {
    conn.query_row(
        &format!("SELECT {SELECT_COLUMNS} FROM calls c WHERE c.id = ?1"),
        [id],
        map_row,
    )
    .optional()?
    .ok_or_else(|| RecordError::not_found("call", id))
}

/// Looks up a call by the provider's call identifier.
pub fn find_call_by_provider_id(
    conn: &Connection,
    provider_call_id: &str,
) -> Result<Option<Call>, RecordError> {
    let call = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM calls c WHERE c.provider_call_id = ?1"),
            [provider_call_id],
            map_row,
        )
        .optional()?;
    Ok(call)
}

/// Replaces the placeholder provider id once the provider has created the call.
pub fn set_provider_call_id(
    conn: &Connection,
    call_id: &str,
    provider_call_id: &str,
) -> Result<(), RecordError> {
    let changed = conn
        .execute(
            "UPDATE calls SET provider_call_id = ?1 WHERE id = ?2",
            [provider_call_id, call_id],
        )
        .map_err(|e| {
            RecordError::from_write(e, || {
                format!("provider call id {} is already assigned", provider_call_id)
            })
        })?;
    if changed == 0 {
        return Err(RecordError::not_found("call", call_id));
    }
    Ok(())
}

/// Moves a call from `initiated` to `in_progress`.
///
/// Returns `false` if the call was in any other status.
pub fn mark_call_in_progress(conn: &Connection, call_id: &str) -> Result<bool, RecordError> {
    let changed = conn.execute(
        "UPDATE calls SET call_status = ?1 WHERE id = ?2 AND call_status = ?3",
        [
            CallStatus::InProgress.as_str(),
            call_id,
            CallStatus::Initiated.as_str(),
        ],
    )?;
    Ok(changed > 0)
}

/// Marks a non-terminal call as `failed` and stamps `ended_at`.
///
/// Returns `false` if the call was already terminal.
pub fn mark_call_failed(conn: &Connection, call_id: &str) -> Result<bool, RecordError> {
    let changed = conn.execute(
        "UPDATE calls SET call_status = ?1, ended_at = ?2
         WHERE id = ?3 AND call_status IN (?4, ?5)",
        params![
            CallStatus::Failed.as_str(),
            now_timestamp(),
            call_id,
            CallStatus::Initiated.as_str(),
            CallStatus::InProgress.as_str(),
        ],
    )?;
    Ok(changed > 0)
}

/// Writes the result for a call and moves it to `completed` atomically.
///
/// Returns `Ok(None)` if the call already has a result; nothing is written in
/// that case. Returns `Conflict` if the call is already terminal without a
/// result (e.g. it failed to start).
pub fn record_completion(
    conn: &Connection,
    call_id: &str,
    completed: &CompletedCall,
) -> Result<Option<CallResult>, RecordError> {
    let tx = conn.unchecked_transaction()?;
    let result = &completed.result;
    let structured_json = serde_json::to_string(&result.structured_data)?;

    let inserted = tx
        .execute(
            "INSERT INTO call_results (
                id, call_id, call_outcome, driver_status, current_location, eta,
                emergency_type, emergency_location, escalation_status,
                raw_transcript, structured_data_json, processing_status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT (call_id) DO NOTHING",
            params![
                new_id(),
                call_id,
                result.call_outcome,
                result.driver_status,
                result.current_location,
                result.eta,
                result.emergency_type,
                result.emergency_location,
                result.escalation_status,
                result.raw_transcript,
                structured_json,
                result.processing_status.as_str(),
                now_timestamp(),
            ],
        )
        .map_err(|e| {
            RecordError::from_write(e, || format!("call {} does not exist", call_id))
        })?;

    if inserted == 0 {
        tracing::debug!(call_id, "call already has a result, skipping completion");
        return Ok(None);
    }

    let updated = tx.execute(
        "UPDATE calls
         SET call_status = ?1,
             ended_at = COALESCE(?2, ended_at),
             duration = ?3
         WHERE id = ?4 AND call_status IN (?5, ?6)",
        params![
            CallStatus::Completed.as_str(),
            completed.ended_at,
            completed.duration,
            call_id,
            CallStatus::Initiated.as_str(),
            CallStatus::InProgress.as_str(),
        ],
    )?;

    if updated == 0 {
        // Dropping the transaction rolls back the result insert.
        let status: Option<String> = tx
            .query_row(
                "SELECT call_status FROM calls WHERE id = ?1",
                [call_id],
                |row| row.get(0),
            )
            .optional()?;
        return Err(match status {
            Some(status) => {
                RecordError::Conflict(format!("call {} is already {}", call_id, status))
            }
            None => RecordError::not_found("call", call_id),
        });
    }

    // A final transcript that arrived while the call was being completed
    // replaces the one fetched for extraction.
    tx.execute(
        "UPDATE call_results
         SET raw_transcript = (SELECT pending_transcript FROM calls WHERE id = ?1)
         WHERE call_id = ?1
           AND EXISTS (SELECT 1 FROM calls WHERE id = ?1 AND pending_transcript IS NOT NULL)",
        [call_id],
    )?;
    tx.execute(
        "UPDATE calls SET pending_transcript = NULL WHERE id = ?1",
        [call_id],
    )?;

    tx.commit()?;
    call_result::find_result_for_call(conn, call_id)
}

/// Lists calls newest first, each joined with its agent config's name and
/// scenario.
pub fn list_calls(conn: &Connection, limit: Option<u32>) -> Result<Vec<CallListItem>, RecordError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS}, a.name, a.scenario_type
         FROM calls c
         LEFT JOIN agent_configs a ON a.id = c.agent_config_id
         ORDER BY c.started_at DESC, c.rowid DESC
         LIMIT ?1"
    ))?;
    // SQLite treats a negative LIMIT as unbounded.
    let limit = limit.map(i64::from).unwrap_or(-1);
    let rows = stmt.query_map([limit], map_list_row)?;
    let mut calls = Vec::new();
    for row in rows {
        calls.push(row?);
    }
    Ok(calls)
}

/// Returns a call with its agent config details and result in one query.
pub fn get_call_summary(conn: &Connection, call_id: &str) -> Result<CallSummary, RecordError> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS}, a.name, a.scenario_type, {}
         FROM calls c
         LEFT JOIN agent_configs a ON a.id = c.agent_config_id
         LEFT JOIN call_results r ON r.call_id = c.id
         WHERE c.id = ?1",
        call_result::SELECT_COLUMNS
    );
    let result_offset = CALL_COLUMN_COUNT + 2;

    conn.query_row(&sql, [call_id], |row| {
        let call_info = map_list_row(row)?;
        let result_id: Option<String> = row.get(result_offset)?;
        let results = match result_id {
            Some(_) => Some(call_result::map_row_at(row, result_offset)?),
            None => None,
        };
        Ok(CallSummary { call_info, results })
    })
    .optional()?
    .ok_or_else(|| RecordError::not_found("call", call_id))
}
