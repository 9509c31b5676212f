//! Dispatch server library logic.

pub mod api;
pub mod api_agent_configs;
pub mod api_calls;
pub mod api_dashboard;
pub mod api_llm_ws;
pub mod api_provider;
pub mod api_webhook;
pub mod bridge;
pub mod config;
pub mod processor;
pub mod webhook_queue;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Extension, Json, Router,
};
use config::Config;
use dispatch_db::DbPool;
use dispatch_extract::TranscriptExtractor;
use dispatch_voice::CallProvider;
use processor::CallProcessor;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use webhook_queue::WebhookQueue;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Call lifecycle processor used by the webhook worker.
    pub processor: Arc<CallProcessor>,
    /// Voice-call provider client.
    pub provider: Arc<dyn CallProvider>,
    /// Sending half of the webhook queue.
    pub webhook_queue: WebhookQueue,
    /// Bridge URL handed to the provider when placing calls.
    pub llm_websocket_url: String,
    /// Allowed CORS origins; empty allows any.
    pub cors_origins: Vec<String>,
}

impl AppState {
    /// Wires the processor and webhook queue around the given clients and
    /// spawns the webhook worker on the current runtime.
    pub fn start(
        pool: DbPool,
        provider: Arc<dyn CallProvider>,
        extractor: Arc<dyn TranscriptExtractor>,
        config: &Config,
    ) -> Self {
        let processor = Arc::new(CallProcessor::new(
            pool.clone(),
            provider.clone(),
            extractor,
        ));
        let (webhook_queue, rx) = WebhookQueue::new(config.webhook.queue_capacity);
        tokio::spawn(webhook_queue::run_worker(
            rx,
            processor.clone(),
            pool.clone(),
            config.webhook.max_concurrency,
        ));

        Self {
            pool,
            processor,
            provider,
            webhook_queue,
            llm_websocket_url: config.bridge.llm_websocket_url(),
            cors_origins: config.server.cors_origins.clone(),
        }
    }
}

/// Maximum request body size (1 MiB).
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.cors_origins);

    Router::new()
        .route("/health", get(health))
        .route(
            "/api/agent-configs",
            get(api_agent_configs::list_configs_handler)
                .post(api_agent_configs::create_config_handler),
        )
        .route(
            "/api/agent-configs/{id}",
            get(api_agent_configs::get_config_handler)
                .put(api_agent_configs::update_config_handler)
                .delete(api_agent_configs::delete_config_handler),
        )
        .route("/api/calls/start", post(api_calls::start_call_handler))
        .route("/api/calls", get(api_calls::list_calls_handler))
        .route("/api/calls/{id}", get(api_calls::get_call_handler))
        .route(
            "/api/calls/{id}/results",
            get(api_calls::get_call_results_handler),
        )
        .route(
            "/api/dashboard/stats",
            get(api_dashboard::dashboard_stats_handler),
        )
        .route(
            "/api/retell-webhook",
            post(api_webhook::receive_webhook_handler),
        )
        .route(
            "/api/webhook-deliveries",
            get(api_webhook::list_deliveries_handler),
        )
        .route(
            "/api/provider/agents",
            get(api_provider::list_provider_agents_handler),
        )
        .route("/api/llm-websocket", get(api_llm_ws::llm_ws_handler))
        .route(
            "/api/llm-websocket/{call_id}",
            get(api_llm_ws::llm_ws_call_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(Extension(Arc::new(state)))
}
