//! Voice agent configurations.

use dispatch_types::ScenarioType;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::RecordError;
use crate::{json_column, label_column, new_id, now_timestamp};

const SELECT_COLUMNS: &str = "id, name, scenario_type, system_prompt, conversation_flow,
    emergency_triggers_json, max_retries, interruption_sensitivity,
    backchannel_enabled, filler_words_enabled, created_at, updated_at";

/// A stored voice agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub id: String,
    pub name: String,
    pub scenario_type: ScenarioType,
    /// Base prompt handed to the provider's agent.
    pub system_prompt: String,
    /// Free-text description of the conversation steps.
    pub conversation_flow: String,
    /// Phrases that should switch the agent into its emergency protocol.
    pub emergency_triggers: Vec<String>,
    pub max_retries: u32,
    /// How readily the agent yields when the driver talks over it (0.0–1.0).
    pub interruption_sensitivity: f64,
    pub backchannel_enabled: bool,
    pub filler_words_enabled: bool,
    pub created_at: String,
    pub updated_at: String,
}

fn default_max_retries() -> u32 {
    3
}

fn default_interruption_sensitivity() -> f64 {
    0.5
}

fn default_true() -> bool {
    true
}

/// Parameters for creating an agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewAgentConfig {
    pub name: String,
    pub scenario_type: ScenarioType,
    pub system_prompt: String,
    pub conversation_flow: String,
    #[serde(default)]
    pub emergency_triggers: Vec<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_interruption_sensitivity")]
    pub interruption_sensitivity: f64,
    #[serde(default = "default_true")]
    pub backchannel_enabled: bool,
    #[serde(default = "default_true")]
    pub filler_words_enabled: bool,
}

impl NewAgentConfig {
    /// Checks field-level constraints before the row is written.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        check_sensitivity(self.interruption_sensitivity)
    }
}

/// Partial update for an agent configuration. `None` fields are untouched.
///
/// The scenario type is fixed at creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfigUpdate {
    pub name: Option<String>,
    pub system_prompt: Option<String>,
    pub conversation_flow: Option<String>,
    pub emergency_triggers: Option<Vec<String>>,
    pub max_retries: Option<u32>,
    pub interruption_sensitivity: Option<f64>,
    pub backchannel_enabled: Option<bool>,
    pub filler_words_enabled: Option<bool>,
}

impl AgentConfigUpdate {
    /// Checks field-level constraints on the fields being changed.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err("name must not be empty".to_string());
            }
        }
        match self.interruption_sensitivity {
            Some(value) => check_sensitivity(value),
            None => Ok(()),
        }
    }
}

fn check_sensitivity(value: f64) -> Result<(), String> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(format!(
            "interruption_sensitivity must be between 0.0 and 1.0, got {}",
            value
        ))
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<AgentConfig> {
    Ok(AgentConfig {
        id: row.get(0)?,
        name: row.get(1)?,
        scenario_type: label_column(2, row.get(2)?)?,
        system_prompt: row.get(3)?,
        conversation_flow: row.get(4)?,
        emergency_triggers: json_column(5, row.get(5)?)?,
        max_retries: row.get(6)?,
        interruption_sensitivity: row.get(7)?,
        backchannel_enabled: row.get(8)?,
        filler_words_enabled: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// Inserts a new agent configuration and returns the stored row.
pub fn create_agent_config(
    conn: &Connection,
    new: &NewAgentConfig,
) -> Result<AgentConfig, RecordError> {
    let id = new_id();
    let now = now_timestamp();
    let triggers_json = serde_json::to_string(&new.emergency_triggers)?;

    conn.execute(
        "INSERT INTO agent_configs (
            id, name, scenario_type, system_prompt, conversation_flow,
            emergency_triggers_json, max_retries, interruption_sensitivity,
            backchannel_enabled, filler_words_enabled, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            id,
            new.name,
            new.scenario_type.as_str(),
            new.system_prompt,
            new.conversation_flow,
            triggers_json,
            new.max_retries,
            new.interruption_sensitivity,
            new.backchannel_enabled,
            new.filler_words_enabled,
            now,
        ],
    )?;

    tracing::debug!(agent_config_id = %id, scenario = %new.scenario_type, "created agent config");
    get_agent_config(conn, &id)
}

/// Retrieves an agent configuration by ID.
pub fn get_agent_config(conn: &Connection, id: &str) -> Result<AgentConfig, RecordError> {
    conn.query_row(
        &format!("SELECT {SELECT_COLUMNS} FROM agent_configs WHERE id = ?1"),
        [id],
        map_row,
    )
    .optional()?
    .ok_or_else(|| RecordError::not_found("agent config", id))
}

/// Lists all agent configurations, newest first.
pub fn list_agent_configs(conn: &Connection) -> Result<Vec<AgentConfig>, RecordError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM agent_configs ORDER BY created_at DESC, rowid DESC"
    ))?;
    let rows = stmt.query_map([], map_row)?;
    let mut configs = Vec::new();
    for row in rows {
        configs.push(row?);
    }
    Ok(configs)
}

/// Applies a partial update in a single UPDATE statement and returns the
/// updated row. `updated_at` is always refreshed.
pub fn update_agent_config(
    conn: &Connection,
    id: &str,
    update: &AgentConfigUpdate,
) -> Result<AgentConfig, RecordError> {
    let mut set_parts: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    let mut push = |column: &str, value: Box<dyn rusqlite::types::ToSql>| {
        values.push(value);
        set_parts.push(format!("{} = ?{}", column, values.len()));
    };

    if let Some(name) = &update.name {
        push("name", Box::new(name.clone()));
    }
    if let Some(prompt) = &update.system_prompt {
        push("system_prompt", Box::new(prompt.clone()));
    }
    if let Some(flow) = &update.conversation_flow {
        push("conversation_flow", Box::new(flow.clone()));
    }
    if let Some(triggers) = &update.emergency_triggers {
        push(
            "emergency_triggers_json",
            Box::new(serde_json::to_string(triggers)?),
        );
    }
    if let Some(retries) = update.max_retries {
        push("max_retries", Box::new(retries));
    }
    if let Some(sensitivity) = update.interruption_sensitivity {
        push("interruption_sensitivity", Box::new(sensitivity));
    }
    if let Some(enabled) = update.backchannel_enabled {
        push("backchannel_enabled", Box::new(enabled));
    }
    if let Some(enabled) = update.filler_words_enabled {
        push("filler_words_enabled", Box::new(enabled));
    }
    push("updated_at", Box::new(now_timestamp()));

    values.push(Box::new(id.to_string()));
    let sql = format!(
        "UPDATE agent_configs SET {} WHERE id = ?{}",
        set_parts.join(", "),
        values.len()
    );

    let params_refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| &**v).collect();
    let changed = conn.execute(&sql, params_refs.as_slice())?;
    if changed == 0 {
        return Err(RecordError::not_found("agent config", id));
    }

    get_agent_config(conn, id)
}

/// Deletes an agent configuration.
///
/// Refused with [`RecordError::Conflict`] while calls still reference it.
pub fn delete_agent_config(conn: &Connection, id: &str) -> Result<(), RecordError> {
    let changed = conn
        .execute("DELETE FROM agent_configs WHERE id = ?1", [id])
        .map_err(|e| {
            RecordError::from_write(e, || {
                format!("agent config {} is still referenced by calls", id)
            })
        })?;
    if changed == 0 {
        return Err(RecordError::not_found("agent config", id));
    }
    Ok(())
}
