use serde::{Deserialize, Serialize};
use std::fmt;

fn default_api_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_generic_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_json_mode() -> bool {
    true
}

/// Settings for the chat-completion API used to extract structured data.
#[derive(Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    /// Model for check-in and emergency transcripts.
    #[serde(default = "default_model")]
    pub model: String,
    /// Model for transcripts with an unrecognised scenario.
    #[serde(default = "default_generic_model")]
    pub generic_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Request `response_format: json_object`. Turn off for models that
    /// reject JSON mode.
    #[serde(default = "default_json_mode")]
    pub json_mode: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: String::new(),
            model: default_model(),
            generic_model: default_generic_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            json_mode: default_json_mode(),
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("generic_model", &self.generic_model)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .field("json_mode", &self.json_mode)
            .finish()
    }
}
