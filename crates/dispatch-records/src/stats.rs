//! Dashboard aggregates.

use dispatch_types::CallStatus;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::RecordError;
use crate::label_column;

const RECENT_CALL_LIMIT: u32 = 5;

/// Call counts by lifecycle status.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub total_calls: i64,
    pub initiated_calls: i64,
    pub in_progress_calls: i64,
    pub completed_calls: i64,
    pub failed_calls: i64,
    /// Results carrying an escalation status.
    pub escalated_calls: i64,
}

/// A row in the dashboard's recent-calls panel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecentCall {
    pub id: String,
    pub driver_name: String,
    pub load_number: String,
    pub call_status: CallStatus,
    pub started_at: String,
    pub agent_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DashboardStats {
    pub stats: StatusCounts,
    pub recent_calls: Vec<RecentCall>,
}

/// Computes the dashboard summary. An empty database yields zero counts.
pub fn dashboard_stats(conn: &Connection) -> Result<DashboardStats, RecordError> {
    let mut stats = StatusCounts::default();

    let mut stmt = conn.prepare("SELECT call_status, COUNT(*) FROM calls GROUP BY call_status")?;
    let rows = stmt.query_map([], |row| {
        let status: CallStatus = label_column(0, row.get(0)?)?;
        let count: i64 = row.get(1)?;
        Ok((status, count))
    })?;
    for row in rows {
        let (status, count) = row?;
        stats.total_calls += count;
        match status {
            CallStatus::Initiated => stats.initiated_calls = count,
            CallStatus::InProgress => stats.in_progress_calls = count,
            CallStatus::Completed => stats.completed_calls = count,
            CallStatus::Failed => stats.failed_calls = count,
        }
    }

    stats.escalated_calls = conn.query_row(
        "SELECT COUNT(*) FROM call_results
         WHERE escalation_status IS NOT NULL AND escalation_status != ''",
        [],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(
        "SELECT c.id, c.driver_name, c.load_number, c.call_status, c.started_at, a.name
         FROM calls c
         LEFT JOIN agent_configs a ON a.id = c.agent_config_id
         ORDER BY c.started_at DESC, c.rowid DESC
         LIMIT ?1",
    )?;
    let rows = stmt.query_map([RECENT_CALL_LIMIT], |row| {
        Ok(RecentCall {
            id: row.get(0)?,
            driver_name: row.get(1)?,
            load_number: row.get(2)?,
            call_status: label_column(3, row.get(3)?)?,
            started_at: row.get(4)?,
            agent_name: row.get(5)?,
        })
    })?;
    let mut recent_calls = Vec::new();
    for row in rows {
        recent_calls.push(row?);
    }

    Ok(DashboardStats {
        stats,
        recent_calls,
    })
}
