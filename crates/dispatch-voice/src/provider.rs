//! The call-provider seam and its wire types.

use async_trait::async_trait;
use dispatch_records::AgentConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::VoiceError;
use crate::prompt::CallContext;

/// Everything needed to place one call.
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub agent_config: AgentConfig,
    pub context: CallContext,
    /// Where the provider should open the realtime response socket.
    pub llm_websocket_url: String,
}

/// The provider's answer to a create-call request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedCall {
    pub call_id: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    /// Session token for the in-browser client; web calls only.
    #[serde(default)]
    pub access_token: Option<String>,
}

/// Call details as reported by the provider's get-call endpoint.
///
/// Timestamps are kept as raw JSON because the provider has sent both epoch
/// milliseconds and RFC 3339 strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderCall {
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default)]
    pub call_status: Option<String>,
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub start_timestamp: Option<Value>,
    #[serde(default)]
    pub end_timestamp: Option<Value>,
}

impl ProviderCall {
    /// The transcript, if present and not blank.
    pub fn non_empty_transcript(&self) -> Option<&str> {
        self.transcript
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }
}

/// Outbound voice-call provider.
#[async_trait]
pub trait CallProvider: Send + Sync {
    /// Dials a driver's phone.
    async fn create_phone_call(
        &self,
        to_number: &str,
        request: &CallRequest,
    ) -> Result<CreatedCall, VoiceError>;

    /// Opens a browser-based call and returns its access token.
    async fn create_web_call(&self, request: &CallRequest) -> Result<CreatedCall, VoiceError>;

    /// Fetches the final transcript and timestamps for a call.
    async fn get_call(&self, provider_call_id: &str) -> Result<ProviderCall, VoiceError>;

    /// Lists the agents registered with the provider.
    async fn list_agents(&self) -> Result<Value, VoiceError>;
}
