#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use dispatch_db::{create_memory_pool, DbPool};
use dispatch_extract::{Extraction, TranscriptExtractor};
use dispatch_records::{create_agent_config, AgentConfig, NewAgentConfig};
use dispatch_server::{app, config::Config, AppState};
use dispatch_types::ScenarioType;
use dispatch_voice::{CallProvider, CallRequest, CreatedCall, ProviderCall, VoiceError};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

/// In-process stand-in for the voice provider.
#[derive(Default)]
pub struct FakeProvider {
    pub fail: AtomicBool,
    pub created: AtomicUsize,
    pub fetched: AtomicUsize,
    /// Delay applied to `get_call` after it is counted.
    pub get_call_delay_ms: AtomicU64,
    pub details: Mutex<HashMap<String, ProviderCall>>,
    pub last_phone: Mutex<Option<String>>,
    pub last_request: Mutex<Option<CallRequest>>,
}

impl FakeProvider {
    pub fn set_details(&self, provider_call_id: &str, details: ProviderCall) {
        self.details
            .lock()
            .unwrap()
            .insert(provider_call_id.to_string(), details);
    }

    fn next_created(&self, request: &CallRequest) -> Result<CreatedCall, VoiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(VoiceError::Status {
                status: 502,
                body: "upstream unavailable".to_string(),
            });
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_request.lock().unwrap() = Some(request.clone());
        Ok(CreatedCall {
            call_id: format!("prov-{}", n),
            agent_id: Some("agent-fake".to_string()),
            access_token: None,
        })
    }
}

#[async_trait]
impl CallProvider for FakeProvider {
    async fn create_phone_call(
        &self,
        to_number: &str,
        request: &CallRequest,
    ) -> Result<CreatedCall, VoiceError> {
        let created = self.next_created(request)?;
        *self.last_phone.lock().unwrap() = Some(to_number.to_string());
        Ok(created)
    }

    async fn create_web_call(&self, request: &CallRequest) -> Result<CreatedCall, VoiceError> {
        let mut created = self.next_created(request)?;
        created.access_token = Some(format!("token-{}", created.call_id));
        Ok(created)
    }

    async fn get_call(&self, provider_call_id: &str) -> Result<ProviderCall, VoiceError> {
        self.fetched.fetch_add(1, Ordering::SeqCst);
        let delay = self.get_call_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.details
            .lock()
            .unwrap()
            .get(provider_call_id)
            .cloned()
            .ok_or_else(|| VoiceError::Status {
                status: 404,
                body: "call not found".to_string(),
            })
    }

    async fn list_agents(&self) -> Result<Value, VoiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(VoiceError::Status {
                status: 401,
                body: "unauthorized".to_string(),
            });
        }
        Ok(json!([{ "agent_id": "agent-fake", "agent_name": "Fake" }]))
    }
}

/// Extractor that returns a canned outcome and counts invocations.
pub struct FakeExtractor {
    pub calls: AtomicUsize,
    pub outcome: Mutex<Extraction>,
    pub last_scenario: Mutex<Option<String>>,
}

impl Default for FakeExtractor {
    fn default() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            outcome: Mutex::new(Extraction::Extracted(json!({
                "call_outcome": "In-Transit Update",
                "driver_status": "Driving",
                "current_location": "I-10 near Indio, CA",
                "eta": "Tomorrow, 8:00 AM"
            }))),
            last_scenario: Mutex::new(None),
        }
    }
}

impl FakeExtractor {
    pub fn set_outcome(&self, outcome: Extraction) {
        *self.outcome.lock().unwrap() = outcome;
    }
}

#[async_trait]
impl TranscriptExtractor for FakeExtractor {
    async fn extract(&self, _transcript: &str, scenario: &str) -> Extraction {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_scenario.lock().unwrap() = Some(scenario.to_string());
        self.outcome.lock().unwrap().clone()
    }
}

pub struct TestApp {
    pub router: Router,
    pub pool: DbPool,
    pub state: AppState,
    pub provider: Arc<FakeProvider>,
    pub extractor: Arc<FakeExtractor>,
}

/// Builds the full router over an in-memory database. Must run inside a
/// tokio runtime because the webhook worker is spawned.
pub fn setup() -> TestApp {
    let pool = create_memory_pool().unwrap();
    let provider = Arc::new(FakeProvider::default());
    let extractor = Arc::new(FakeExtractor::default());
    let state = AppState::start(
        pool.clone(),
        provider.clone(),
        extractor.clone(),
        &Config::default(),
    );
    TestApp {
        router: app(state.clone()),
        pool,
        state,
        provider,
        extractor,
    }
}

pub fn new_config(name: &str, scenario: ScenarioType) -> NewAgentConfig {
    NewAgentConfig {
        name: name.to_string(),
        scenario_type: scenario,
        system_prompt: "You are a dispatcher checking in with a driver.".to_string(),
        conversation_flow: "Ask for status, then location, then ETA.".to_string(),
        emergency_triggers: vec!["accident".to_string(), "breakdown".to_string()],
        max_retries: 3,
        interruption_sensitivity: 0.5,
        backchannel_enabled: true,
        filler_words_enabled: true,
    }
}

pub fn seed_config(pool: &DbPool, scenario: ScenarioType) -> AgentConfig {
    let conn = pool.get().unwrap();
    create_agent_config(&conn, &new_config("Check-in Agent", scenario)).unwrap()
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

pub async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(router, request).await
}

pub async fn send_json(
    router: &Router,
    method: &str,
    uri: &str,
    body: Value,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, request).await
}

/// Polls the delivery log until `delivery_id` leaves the `queued` state.
pub async fn wait_for_delivery(router: &Router, delivery_id: i64) -> Value {
    for _ in 0..200 {
        let (_, body) = get(router, "/api/webhook-deliveries?limit=500").await;
        let found = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .find(|d| d["id"] == delivery_id)
            .cloned();
        if let Some(delivery) = found {
            if delivery["status"] != "queued" {
                return delivery;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("delivery {} was never processed", delivery_id);
}
