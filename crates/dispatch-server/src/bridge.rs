//! Realtime response bridge.
//!
//! The provider pushes the live conversation over a websocket and asks what
//! the agent should say next. Replies are computed from the latest user
//! utterance alone; nothing is kept between messages.

use serde::{Deserialize, Serialize};

pub const DEFAULT_REPLY: &str =
    "I understand. Can you provide more details about your current location?";

pub const EMERGENCY_REPLY: &str =
    "I understand this is an emergency. Can you tell me your exact location with mile markers if possible?";

const EMERGENCY_KEYWORDS: [&str; 5] = ["emergency", "accident", "breakdown", "help", "crash"];

/// One turn of the live transcript.
#[derive(Debug, Clone, Deserialize)]
pub struct Utterance {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

/// A message pushed by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeRequest {
    pub interaction_type: String,
    #[serde(default)]
    pub response_id: u64,
    #[serde(default)]
    pub transcript: Vec<Utterance>,
}

/// A message sent back to the provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BridgeReply {
    Response {
        response_id: u64,
        content: String,
        content_complete: bool,
        end_call: bool,
    },
    Pong {
        #[serde(rename = "type")]
        kind: &'static str,
    },
}

impl BridgeReply {
    fn pong() -> Self {
        Self::Pong { kind: "pong" }
    }
}

/// Whether an utterance mentions an emergency keyword (case-insensitive).
pub fn mentions_emergency(text: &str) -> bool {
    let lower = text.to_lowercase();
    EMERGENCY_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Computes the reply for a request, or `None` when none is expected.
pub fn respond(request: &BridgeRequest) -> Option<BridgeReply> {
    match request.interaction_type.as_str() {
        "response_required" | "reminder_required" => {
            let last_user = request
                .transcript
                .iter()
                .rev()
                .find(|u| u.role == "user")
                .map(|u| u.content.as_str())
                .unwrap_or("");
            let content = if mentions_emergency(last_user) {
                EMERGENCY_REPLY
            } else {
                DEFAULT_REPLY
            };
            Some(BridgeReply::Response {
                response_id: request.response_id,
                content: content.to_string(),
                content_complete: true,
                end_call: false,
            })
        }
        "ping" | "ping_pong" => Some(BridgeReply::pong()),
        _ => None,
    }
}
