//! Server configuration loading from file and environment variables.

use dispatch_extract::ExtractionConfig;
use dispatch_voice::ProviderConfig;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Voice-call provider credentials and endpoint.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Transcript extraction model settings.
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Realtime response bridge settings.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Webhook queue settings.
    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "dispatch_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Realtime response bridge configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Public base URL of this server as reachable by the provider.
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

/// Webhook queue configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Deliveries buffered before the receiver answers 503.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Deliveries processed at the same time.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8000
}

fn default_db_path() -> String {
    "dispatch.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_public_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_queue_capacity() -> usize {
    256
}

fn default_max_concurrency() -> usize {
    4
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            public_url: default_public_url(),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl BridgeConfig {
    /// The websocket URL handed to the provider for realtime responses.
    ///
    /// `http` and `https` base URLs are mapped to `ws` and `wss`.
    pub fn llm_websocket_url(&self) -> String {
        let base = self.public_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!("{}/api/llm-websocket", base)
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `DISPATCH_HOST`, `DISPATCH_PORT` override `server.host` / `server.port`
/// - `DISPATCH_CORS_ORIGINS` (comma-separated) overrides `server.cors_origins`
/// - `DISPATCH_DB_PATH` overrides `database.path`
/// - `DISPATCH_LOG_LEVEL` overrides `logging.level`
/// - `DISPATCH_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `RETELL_API_KEY`, `RETELL_AGENT_ID`, `RETELL_FROM_NUMBER`, `RETELL_API_URL`
///   override the `provider` section
/// - `OPENAI_API_KEY`, `OPENAI_API_URL`, `OPENAI_MODEL` override the
///   `extraction` section
/// - `BACKEND_URL` overrides `bridge.public_url`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Applies overrides from `lookup`, which maps a variable name to its value.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(host) = lookup("DISPATCH_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = lookup("DISPATCH_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(origins) = lookup("DISPATCH_CORS_ORIGINS") {
        config.server.cors_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(db_path) = lookup("DISPATCH_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = lookup("DISPATCH_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("DISPATCH_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    if let Some(key) = lookup("RETELL_API_KEY") {
        config.provider.api_key = key;
    }
    if let Some(agent_id) = lookup("RETELL_AGENT_ID") {
        config.provider.agent_id = agent_id;
    }
    if let Some(number) = lookup("RETELL_FROM_NUMBER") {
        config.provider.from_number = number;
    }
    if let Some(url) = lookup("RETELL_API_URL") {
        config.provider.api_url = url;
    }

    if let Some(key) = lookup("OPENAI_API_KEY") {
        config.extraction.api_key = key;
    }
    if let Some(url) = lookup("OPENAI_API_URL") {
        config.extraction.api_url = url;
    }
    if let Some(model) = lookup("OPENAI_MODEL") {
        config.extraction.model = model;
    }

    if let Some(url) = lookup("BACKEND_URL") {
        config.bridge.public_url = url;
    }
}
