use crate::config::ProviderConfig;
use crate::error::VoiceError;
use crate::prompt::{begin_message, build_dynamic_prompt};
use crate::provider::{CallProvider, CallRequest, CreatedCall, ProviderCall};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;

const BACKCHANNEL_FREQUENCY: f64 = 0.8;
const BACKCHANNEL_WORDS: [&str; 4] = ["uh-huh", "mm-hmm", "I see", "okay"];
const REMINDER_TRIGGER_MS: u64 = 10_000;
const REMINDER_MAX_COUNT: u32 = 2;

/// Retell v2 API client.
#[derive(Debug, Clone)]
pub struct RetellClient {
    config: ProviderConfig,
    http: Client,
}

impl RetellClient {
    pub fn new(config: ProviderConfig) -> Result<Self, VoiceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VoiceError::Config(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { config, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }

    fn metadata(request: &CallRequest) -> Value {
        json!({
            "driver_name": request.context.driver_name,
            "load_number": request.context.load_number,
            "scenario_type": request.agent_config.scenario_type,
            "config_id": request.agent_config.id,
        })
    }

    fn agent_settings(request: &CallRequest) -> Value {
        let config = &request.agent_config;
        json!({
            "llm_websocket_url": request.llm_websocket_url,
            "begin_message": begin_message(&request.context),
            "general_prompt": build_dynamic_prompt(config, &request.context),
            "general_tools": [],
            "interruption_sensitivity": config.interruption_sensitivity,
            "enable_backchannel": config.backchannel_enabled,
            "backchannel_frequency": BACKCHANNEL_FREQUENCY,
            "backchannel_words": BACKCHANNEL_WORDS,
            "reminder_trigger_ms": REMINDER_TRIGGER_MS,
            "reminder_max_count": REMINDER_MAX_COUNT,
            "ambient_sound": "office",
        })
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, VoiceError> {
        let response = builder
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), %body, "provider request rejected");
            return Err(VoiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl CallProvider for RetellClient {
    async fn create_phone_call(
        &self,
        to_number: &str,
        request: &CallRequest,
    ) -> Result<CreatedCall, VoiceError> {
        let payload = json!({
            "from_number": self.config.from_number,
            "to_number": to_number,
            "override_agent_id": self.config.agent_id,
            "agent_settings": Self::agent_settings(request),
            "metadata": Self::metadata(request),
        });

        let created: CreatedCall = self
            .send(self.http.post(self.url("/v2/create-phone-call")).json(&payload))
            .await?;
        tracing::info!(
            provider_call_id = %created.call_id,
            agent_config_id = %request.agent_config.id,
            "created phone call"
        );
        Ok(created)
    }

    async fn create_web_call(&self, request: &CallRequest) -> Result<CreatedCall, VoiceError> {
        let payload = json!({
            "agent_id": self.config.agent_id,
            "agent_settings": Self::agent_settings(request),
            "metadata": Self::metadata(request),
        });

        let created: CreatedCall = self
            .send(self.http.post(self.url("/v2/create-web-call")).json(&payload))
            .await?;
        tracing::info!(
            provider_call_id = %created.call_id,
            agent_config_id = %request.agent_config.id,
            "created web call"
        );
        Ok(created)
    }

    async fn get_call(&self, provider_call_id: &str) -> Result<ProviderCall, VoiceError> {
        self.send(
            self.http
                .get(self.url(&format!("/v2/get-call/{}", provider_call_id))),
        )
        .await
    }

    async fn list_agents(&self) -> Result<Value, VoiceError> {
        self.send(self.http.get(self.url("/list-agents"))).await
    }
}
