//! Extraction schemas: the instruction sent for each scenario and the
//! structure stored when extraction fails.

use serde_json::{json, Value};

/// Which fixed shape a transcript is extracted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionSchema {
    CheckIn,
    Emergency,
    Generic,
}

impl ExtractionSchema {
    /// Maps a scenario tag to its schema. Unknown tags use [`Self::Generic`].
    pub fn for_scenario(scenario: &str) -> Self {
        match scenario {
            "check_in" => Self::CheckIn,
            "emergency" => Self::Emergency,
            _ => Self::Generic,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CheckIn => "check_in",
            Self::Emergency => "emergency",
            Self::Generic => "generic",
        }
    }

    pub fn system_message(self) -> &'static str {
        match self {
            Self::CheckIn => {
                "You are an expert at analyzing logistics call transcripts. Return only valid JSON."
            }
            Self::Emergency => {
                "You are an expert at analyzing emergency logistics calls. Return only valid JSON."
            }
            Self::Generic => {
                "You are an expert at analyzing call transcripts. Return only valid JSON."
            }
        }
    }

    pub fn max_tokens(self) -> u32 {
        match self {
            Self::CheckIn | Self::Emergency => 500,
            Self::Generic => 300,
        }
    }

    fn field_description(self) -> &'static str {
        match self {
            Self::CheckIn => {
                "Analyze this truck driver check-in call transcript and extract the following information in JSON format:

Required fields:
- call_outcome: \"In-Transit Update\" OR \"Arrival Confirmation\" OR \"Emergency Detected\" OR \"Uncooperative Driver\" OR \"Call Failed\"
- driver_status: \"Driving\" OR \"Delayed\" OR \"Arrived\" OR \"Unknown\"
- current_location: Extract the current location mentioned by the driver (or null if not provided)
- eta: Extract the estimated time of arrival (or null if not provided)
- emergency_type: Only if emergency detected - \"Accident\" OR \"Breakdown\" OR \"Medical\" OR \"Other\" OR null
- emergency_location: Only if emergency - location of emergency OR null
- escalation_status: \"Escalation Flagged\" if emergency detected, otherwise null
- additional_notes: Any other relevant information from the call"
            }
            Self::Emergency => {
                "Analyze this emergency logistics call transcript and extract the following information in JSON format:

Required fields:
- call_outcome: \"Emergency Detected\"
- emergency_type: \"Accident\" OR \"Breakdown\" OR \"Medical\" OR \"Other\"
- emergency_location: The specific location of the emergency including mile markers if mentioned
- driver_status: \"In Emergency\" OR \"Safe\" OR \"Injured\" OR \"Unknown\"
- escalation_status: \"Escalation Flagged\"
- urgency_level: \"High\" OR \"Medium\" OR \"Low\"
- additional_details: Any other critical emergency information"
            }
            Self::Generic => {
                "Analyze this call transcript and extract key information in JSON format:

Fields to extract:
- call_outcome: Brief description of what happened in the call
- key_information: List of important points discussed
- sentiment: \"Positive\" OR \"Negative\" OR \"Neutral\"
- call_success: true OR false"
            }
        }
    }

    /// The user instruction embedding the transcript.
    pub fn instruction(self, transcript: &str) -> String {
        format!(
            "{}\n\nTranscript:\n{}\n\nReturn only valid JSON:",
            self.field_description(),
            transcript
        )
    }

    /// The structure stored when extraction fails for this schema.
    pub fn default_structure(self, reason: &str) -> Value {
        match self {
            Self::CheckIn => json!({
                "call_outcome": "Processing Failed",
                "driver_status": "Unknown",
                "current_location": null,
                "eta": null,
                "emergency_type": null,
                "emergency_location": null,
                "escalation_status": null,
                "additional_notes": "Failed to process transcript automatically",
            }),
            Self::Emergency => json!({
                "call_outcome": "Emergency Detected",
                "emergency_type": "Other",
                "emergency_location": "Unknown",
                "driver_status": "Unknown",
                "escalation_status": "Escalation Flagged",
                "urgency_level": "High",
                "additional_details": "Failed to process emergency transcript automatically",
            }),
            Self::Generic => json!({
                "call_outcome": "Processing Failed",
                "error": reason,
            }),
        }
    }
}
