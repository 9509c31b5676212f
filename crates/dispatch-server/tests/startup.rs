mod common;

use axum::http::StatusCode;
use common::{get, send_json, FakeExtractor, FakeProvider};
use dispatch_db::{create_pool, run_migrations, DbRuntimeSettings};
use dispatch_server::{app, config::load_config, AppState};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn file_config_and_database_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("dispatch.db");
    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
[server]
port = 9100

[database]
path = "{}"
pool_max_size = 2

[bridge]
public_url = "https://dispatch.example.test"

[webhook]
queue_capacity = 8
max_concurrency = 2
"#,
            db_path.display()
        ),
    )
    .unwrap();

    let config = load_config(config_path.to_str()).unwrap();
    assert_eq!(config.webhook.queue_capacity, 8);
    assert_eq!(config.database.pool_max_size, 2);

    let open = || {
        let pool = create_pool(
            &config.database.path,
            DbRuntimeSettings {
                busy_timeout_ms: config.database.busy_timeout_ms,
                pool_max_size: config.database.pool_max_size,
            },
        )
        .unwrap();
        run_migrations(&pool.get().unwrap()).unwrap();
        let state = AppState::start(
            pool,
            Arc::new(FakeProvider::default()),
            Arc::new(FakeExtractor::default()),
            &config,
        );
        app(state)
    };

    let router = open();
    let (status, _) = send_json(
        &router,
        "POST",
        "/api/agent-configs",
        json!({
            "name": "Persistent Agent",
            "scenario_type": "check_in",
            "system_prompt": "p",
            "conversation_flow": "f"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    drop(router);

    let router = open();
    let (_, body) = get(&router, "/api/agent-configs").await;
    let configs = body["data"].as_array().unwrap();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0]["name"], "Persistent Agent");
}

#[test]
fn missing_config_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let config = load_config(path.to_str()).unwrap();
    assert_eq!(config.webhook.max_concurrency, 4);
    assert_eq!(config.database.busy_timeout_ms, 5_000);
}
