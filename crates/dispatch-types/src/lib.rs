//! Shared types and constants for the dispatch backend.
//!
//! This crate holds the small closed vocabularies that every other crate in
//! the workspace agrees on: the scenario a call is placed for, the lifecycle
//! status of a call, how its transcript was processed, and the state of a
//! recorded webhook delivery.
//!
//! Every enum is stored in SQLite as its `as_str()` label and parsed back
//! through `FromStr`, so the database text and the JSON wire form are always
//! the same snake_case string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when a stored or submitted label does not name a known
/// variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseLabelError {
    /// Which vocabulary was being parsed (e.g. `scenario type`).
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Purpose of a call; selects the agent prompt and the extraction schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioType {
    /// Routine status check with a driver on a load.
    CheckIn,
    /// A driver reporting an accident, breakdown, or medical issue.
    Emergency,
}

impl ScenarioType {
    /// Returns the canonical label for this scenario.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CheckIn => "check_in",
            Self::Emergency => "emergency",
        }
    }
}

impl fmt::Display for ScenarioType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioType {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "check_in" => Ok(Self::CheckIn),
            "emergency" => Ok(Self::Emergency),
            _ => Err(ParseLabelError {
                kind: "scenario type",
                value: s.to_string(),
            }),
        }
    }
}

/// Lifecycle status of a call.
///
/// Status only moves forward: `initiated` → `in_progress` → `completed` or
/// `failed`. A call may also jump straight from `initiated` to a terminal
/// state when the provider reports the end before the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// Row created, provider call requested.
    Initiated,
    /// Provider reported the call as connected.
    InProgress,
    /// Call ended and its result has been written.
    Completed,
    /// The provider call could not be placed.
    Failed,
}

impl CallStatus {
    /// Returns the canonical label for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transition is allowed out of this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a forward transition.
    pub fn can_transition_to(self, next: CallStatus) -> bool {
        match (self, next) {
            (Self::Initiated, Self::InProgress) => true,
            (Self::Initiated | Self::InProgress, Self::Completed | Self::Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallStatus {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(Self::Initiated),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseLabelError {
                kind: "call status",
                value: s.to_string(),
            }),
        }
    }
}

/// How the structured data on a call result was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// The extraction model returned a valid JSON object.
    Processed,
    /// Extraction failed; the scenario's default structure was stored.
    Degraded,
    /// No transcript was available, extraction was never attempted.
    Unprocessed,
}

impl ProcessingStatus {
    /// Returns the canonical label for this processing status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Degraded => "degraded",
            Self::Unprocessed => "unprocessed",
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processed" => Ok(Self::Processed),
            "degraded" => Ok(Self::Degraded),
            "unprocessed" => Ok(Self::Unprocessed),
            _ => Err(ParseLabelError {
                kind: "processing status",
                value: s.to_string(),
            }),
        }
    }
}

/// State of a recorded webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Accepted and waiting for (or undergoing) processing.
    Queued,
    /// The call processor handled the event.
    Processed,
    /// Processing failed; a redelivery with the same key is re-queued.
    Failed,
}

impl DeliveryStatus {
    /// Returns the canonical label for this delivery status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "processed" => Ok(Self::Processed),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseLabelError {
                kind: "delivery status",
                value: s.to_string(),
            }),
        }
    }
}
