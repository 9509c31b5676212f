//! The extraction seam and its chat-completion implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::api_types::{
    ApiErrorBody, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ResponseFormat,
};
use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::schema::ExtractionSchema;

/// Outcome of extracting a transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// The model returned a JSON object.
    Extracted(Value),
    /// Extraction failed; `data` is the schema's default structure.
    Degraded { data: Value, reason: String },
}

impl Extraction {
    pub fn data(&self) -> &Value {
        match self {
            Self::Extracted(data) | Self::Degraded { data, .. } => data,
        }
    }

    pub fn into_data(self) -> Value {
        match self {
            Self::Extracted(data) | Self::Degraded { data, .. } => data,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Turns a transcript into structured data for a scenario.
///
/// Implementations never fail: any problem yields [`Extraction::Degraded`].
#[async_trait]
pub trait TranscriptExtractor: Send + Sync {
    async fn extract(&self, transcript: &str, scenario: &str) -> Extraction;
}

/// Extractor backed by an OpenAI-compatible chat-completion API.
#[derive(Debug, Clone)]
pub struct OpenAiExtractor {
    client: Client,
    config: ExtractionConfig,
}

impl OpenAiExtractor {
    pub fn new(config: ExtractionConfig) -> Result<Self, ExtractError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ExtractError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self { client, config })
    }

    fn model_for(&self, schema: ExtractionSchema) -> &str {
        match schema {
            ExtractionSchema::CheckIn | ExtractionSchema::Emergency => &self.config.model,
            ExtractionSchema::Generic => &self.config.generic_model,
        }
    }

    async fn try_extract(
        &self,
        transcript: &str,
        schema: ExtractionSchema,
    ) -> Result<Value, ExtractError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.api_url.trim_end_matches('/')
        );
        let request = ChatCompletionRequest {
            model: self.model_for(schema).to_string(),
            messages: vec![
                ChatMessage::system(schema.system_message()),
                ChatMessage::user(schema.instruction(transcript)),
            ],
            temperature: self.config.temperature,
            max_tokens: schema.max_tokens(),
            response_format: self.config.json_mode.then(ResponseFormat::json_object),
        };

        debug!(schema = schema.as_str(), model = %request.model, "requesting extraction");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&error_text)
                .map(|body| body.error.message)
                .unwrap_or(error_text);
            return Err(ExtractError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let completion: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| ExtractError::MalformedResponse(e.to_string()))?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ExtractError::EmptyContent)?;

        parse_object(&content)
    }
}

/// Parses model output that must be a JSON object.
pub fn parse_object(content: &str) -> Result<Value, ExtractError> {
    let value: Value = serde_json::from_str(content.trim())?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(ExtractError::NotAnObject)
    }
}

#[async_trait]
impl TranscriptExtractor for OpenAiExtractor {
    async fn extract(&self, transcript: &str, scenario: &str) -> Extraction {
        let schema = ExtractionSchema::for_scenario(scenario);
        match self.try_extract(transcript, schema).await {
            Ok(data) => Extraction::Extracted(data),
            Err(e) => {
                let reason = e.to_string();
                warn!(schema = schema.as_str(), error = %reason, "extraction degraded");
                Extraction::Degraded {
                    data: schema.default_structure(&reason),
                    reason,
                }
            }
        }
    }
}
