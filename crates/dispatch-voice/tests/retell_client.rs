use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use dispatch_records::AgentConfig;
use dispatch_types::ScenarioType;
use dispatch_voice::{CallContext, CallProvider, CallRequest, ProviderConfig, RetellClient};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct Captured {
    requests: Arc<Mutex<Vec<(String, Option<String>, Value)>>>,
}

impl Captured {
    fn push(&self, path: &str, headers: &HeaderMap, body: Value) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.requests
            .lock()
            .unwrap()
            .push((path.to_string(), auth, body));
    }

    fn take(&self) -> Vec<(String, Option<String>, Value)> {
        std::mem::take(&mut *self.requests.lock().unwrap())
    }
}

async fn create_phone_call(
    State(captured): State<Captured>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    captured.push("/v2/create-phone-call", &headers, body);
    Json(json!({"call_id": "call_phone_1", "agent_id": "agent_1", "call_status": "registered"}))
}

async fn create_web_call(
    State(captured): State<Captured>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    captured.push("/v2/create-web-call", &headers, body);
    Json(json!({"call_id": "call_web_1", "agent_id": "agent_1", "access_token": "tok_123"}))
}

async fn get_call(Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    match id.as_str() {
        "call_done" => Ok(Json(json!({
            "call_id": "call_done",
            "call_status": "ended",
            "transcript": "Agent: Hi Mike\nUser: I'm on I-10",
            "start_timestamp": 1704067200000i64,
            "end_timestamp": 1704067530000i64,
        }))),
        _ => Err(StatusCode::NOT_FOUND),
    }
}

async fn list_agents() -> Json<Value> {
    Json(json!([{"agent_id": "agent_1", "agent_name": "Dispatch"}]))
}

async fn spawn_mock() -> (String, Captured) {
    let captured = Captured::default();
    let app = Router::new()
        .route("/v2/create-phone-call", post(create_phone_call))
        .route("/v2/create-web-call", post(create_web_call))
        .route("/v2/get-call/{id}", get(get_call))
        .route("/list-agents", get(list_agents))
        .with_state(captured.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), captured)
}

fn client(api_url: &str) -> RetellClient {
    let mut config = ProviderConfig::new(api_url, "key_test");
    config.agent_id = "agent_1".to_string();
    config.from_number = "+15550001111".to_string();
    RetellClient::new(config).unwrap()
}

fn request() -> CallRequest {
    CallRequest {
        agent_config: AgentConfig {
            id: "cfg-1".to_string(),
            name: "Check-in".to_string(),
            scenario_type: ScenarioType::CheckIn,
            system_prompt: "You are a dispatcher.".to_string(),
            conversation_flow: "Ask for status.".to_string(),
            emergency_triggers: vec!["accident".to_string()],
            max_retries: 3,
            interruption_sensitivity: 0.3,
            backchannel_enabled: false,
            filler_words_enabled: true,
            created_at: "2024-01-01T00:00:00.000Z".to_string(),
            updated_at: "2024-01-01T00:00:00.000Z".to_string(),
        },
        context: CallContext {
            driver_name: "Mike".to_string(),
            load_number: "7891-B".to_string(),
        },
        llm_websocket_url: "ws://backend.test/api/llm-websocket".to_string(),
    }
}

#[tokio::test]
async fn phone_call_payload_carries_prompt_and_settings() {
    let (url, captured) = spawn_mock().await;
    let client = client(&url);

    let created = client
        .create_phone_call("+15557654321", &request())
        .await
        .expect("create should succeed");
    assert_eq!(created.call_id, "call_phone_1");
    assert!(created.access_token.is_none());

    let requests = captured.take();
    assert_eq!(requests.len(), 1);
    let (path, auth, body) = &requests[0];
    assert_eq!(path, "/v2/create-phone-call");
    assert_eq!(auth.as_deref(), Some("Bearer key_test"));
    assert_eq!(body["to_number"], "+15557654321");
    assert_eq!(body["from_number"], "+15550001111");
    assert_eq!(body["override_agent_id"], "agent_1");

    let settings = &body["agent_settings"];
    assert_eq!(settings["llm_websocket_url"], "ws://backend.test/api/llm-websocket");
    assert_eq!(settings["interruption_sensitivity"], 0.3);
    assert_eq!(settings["enable_backchannel"], false);
    assert!(settings["begin_message"]
        .as_str()
        .unwrap()
        .starts_with("Hi Mike, this is Dispatch"));
    assert!(settings["general_prompt"]
        .as_str()
        .unwrap()
        .contains("- Load Number: 7891-B"));

    assert_eq!(body["metadata"]["scenario_type"], "check_in");
    assert_eq!(body["metadata"]["config_id"], "cfg-1");
}

#[tokio::test]
async fn web_call_returns_access_token() {
    let (url, captured) = spawn_mock().await;
    let created = client(&url).create_web_call(&request()).await.unwrap();

    assert_eq!(created.call_id, "call_web_1");
    assert_eq!(created.access_token.as_deref(), Some("tok_123"));
    let requests = captured.take();
    assert_eq!(requests[0].0, "/v2/create-web-call");
    assert_eq!(requests[0].2["agent_id"], "agent_1");
}

#[tokio::test]
async fn get_call_returns_transcript_and_timestamps() {
    let (url, _) = spawn_mock().await;
    let call = client(&url).get_call("call_done").await.unwrap();

    assert_eq!(call.non_empty_transcript(), Some("Agent: Hi Mike\nUser: I'm on I-10"));
    assert_eq!(call.start_timestamp, Some(json!(1704067200000i64)));
    assert_eq!(call.end_timestamp, Some(json!(1704067530000i64)));
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let (url, _) = spawn_mock().await;
    let err = client(&url).get_call("call_missing").await.unwrap_err();

    match err {
        dispatch_voice::VoiceError::Status { status, .. } => assert_eq!(status, 404),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn list_agents_passes_body_through() {
    let (url, _) = spawn_mock().await;
    let agents = client(&url).list_agents().await.unwrap();
    assert_eq!(agents[0]["agent_id"], "agent_1");
}

#[tokio::test]
async fn unreachable_provider_is_an_http_error() {
    let err = client("http://127.0.0.1:9").get_call("x").await.unwrap_err();
    assert!(matches!(err, dispatch_voice::VoiceError::Http(_)), "got {err:?}");
}
