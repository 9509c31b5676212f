use serde::{Deserialize, Serialize};
use std::fmt;

fn default_api_url() -> String {
    "https://api.retellai.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_from_number() -> String {
    "+1234567890".to_string()
}

/// Connection settings for the voice-call provider.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL without a trailing slash.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    /// Provider agent that every call overrides with its own prompt.
    #[serde(default)]
    pub agent_id: String,
    /// Caller ID for outbound phone calls.
    #[serde(default = "default_from_number")]
    pub from_number: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: String::new(),
            agent_id: String::new(),
            from_number: default_from_number(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .field("agent_id", &self.agent_id)
            .field("from_number", &self.from_number)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ProviderConfig {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}
