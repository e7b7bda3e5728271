//! Sync configuration.
//!
//! The relay address is picked per environment. Browsers are classified by
//! the page's host name; native clients read `WASMDRAW_ENV`.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::{SyncError, SyncResult};
use crate::reconnect::{
    DEFAULT_RECONNECT_INITIAL_MS, DEFAULT_RECONNECT_MAX_ATTEMPTS, DEFAULT_RECONNECT_MAX_MS,
    ReconnectPolicy,
};

/// Default flush cadence in milliseconds.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 50;

/// Relay used while developing locally.
pub const DEFAULT_LOCAL_ENDPOINT: &str = "ws://localhost:8080";

/// Public relay.
pub const DEFAULT_PRODUCTION_ENDPOINT: &str = "wss://wasm-draw.art";

/// Reason sent with the normal-closure frame.
pub const DEFAULT_CLOSE_REASON: &str = "closing connection normally";

/// Close code for a normal closure.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Path the relay serves websockets on.
const WS_PATH: &str = "/ws";

/// Environment variable read by [`Environment::detect`] on native targets.
pub const ENVIRONMENT_VAR: &str = "WASMDRAW_ENV";

/// Which relay a client talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    LocalDevelopment,
    Production,
}

impl Environment {
    /// Classify a host name. Loopback hosts are local development.
    pub fn from_host(host: &str) -> Self {
        match host.trim().to_ascii_lowercase().as_str() {
            "localhost" | "127.0.0.1" | "::1" | "[::1]" => Environment::LocalDevelopment,
            _ => Environment::Production,
        }
    }

    /// Parse a user-supplied environment name.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "local" | "local_development" | "development" | "dev" => {
                Some(Environment::LocalDevelopment)
            }
            "production" | "prod" => Some(Environment::Production),
            _ => None,
        }
    }

    /// Detect the environment from the page's host name.
    #[cfg(target_arch = "wasm32")]
    pub fn detect() -> Self {
        web_sys::window()
            .and_then(|window| window.location().hostname().ok())
            .map(|host| Self::from_host(&host))
            .unwrap_or(Environment::Production)
    }

    /// Detect the environment from `WASMDRAW_ENV`, defaulting to local development.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn detect() -> Self {
        match std::env::var(ENVIRONMENT_VAR) {
            Ok(value) => Self::parse(&value).unwrap_or_else(|| {
                log::warn!("Unrecognized {}={:?}, using local development", ENVIRONMENT_VAR, value);
                Environment::LocalDevelopment
            }),
            Err(_) => Environment::LocalDevelopment,
        }
    }
}

/// Configuration for a [`SyncSession`](crate::SyncSession).
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub environment: Environment,
    /// Base websocket address used in local development.
    pub local_endpoint: String,
    /// Base websocket address used in production.
    pub production_endpoint: String,
    /// Cadence of the batcher.
    pub flush_interval: Duration,
    pub reconnect: ReconnectPolicy,
    /// Reason attached to the normal-closure frame.
    pub close_reason: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            local_endpoint: DEFAULT_LOCAL_ENDPOINT.to_string(),
            production_endpoint: DEFAULT_PRODUCTION_ENDPOINT.to_string(),
            flush_interval: Duration::from_millis(DEFAULT_FLUSH_INTERVAL_MS),
            reconnect: ReconnectPolicy::default(),
            close_reason: DEFAULT_CLOSE_REASON.to_string(),
        }
    }
}

/// JSON form of [`SyncConfig`]. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    environment: Option<Environment>,
    local_endpoint: Option<String>,
    production_endpoint: Option<String>,
    flush_interval_ms: Option<u64>,
    close_reason: Option<String>,
    reconnect: Option<ReconnectFile>,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ReconnectFile {
    enabled: bool,
    initial_delay_ms: u64,
    multiplier: f64,
    max_delay_ms: u64,
    max_attempts: u32,
}

impl Default for ReconnectFile {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_ms: DEFAULT_RECONNECT_INITIAL_MS,
            multiplier: 2.0,
            max_delay_ms: DEFAULT_RECONNECT_MAX_MS,
            max_attempts: DEFAULT_RECONNECT_MAX_ATTEMPTS,
        }
    }
}

impl From<ReconnectFile> for ReconnectPolicy {
    fn from(file: ReconnectFile) -> Self {
        Self {
            enabled: file.enabled,
            initial_delay: Duration::from_millis(file.initial_delay_ms),
            multiplier: file.multiplier,
            max_delay: Duration::from_millis(file.max_delay_ms),
            max_attempts: file.max_attempts,
        }
    }
}

impl SyncConfig {
    /// Defaults for the detected environment.
    pub fn detect() -> Self {
        Self::default().with_environment(Environment::detect())
    }

    /// Load from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> SyncResult<Self> {
        let file: ConfigFile =
            serde_json::from_str(json).map_err(|e| SyncError::Serialization(e.to_string()))?;
        let defaults = Self::default();
        let config = Self {
            environment: file.environment.unwrap_or(defaults.environment),
            local_endpoint: file.local_endpoint.unwrap_or(defaults.local_endpoint),
            production_endpoint: file.production_endpoint.unwrap_or(defaults.production_endpoint),
            flush_interval: file
                .flush_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.flush_interval),
            reconnect: file.reconnect.map(Into::into).unwrap_or(defaults.reconnect),
            close_reason: file.close_reason.unwrap_or(defaults.close_reason),
        };
        if config.flush_interval.is_zero() {
            return Err(SyncError::Serialization(
                "flush_interval_ms must be positive".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Override the base address of the current environment.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        match self.environment {
            Environment::LocalDevelopment => self.local_endpoint = endpoint.into(),
            Environment::Production => self.production_endpoint = endpoint.into(),
        }
        self
    }

    /// Base address for the configured environment.
    pub fn endpoint(&self) -> &str {
        match self.environment {
            Environment::LocalDevelopment => &self.local_endpoint,
            Environment::Production => &self.production_endpoint,
        }
    }

    /// Full connection target: `<endpoint>/ws?room=<room>`.
    pub fn endpoint_url(&self, room: &str) -> SyncResult<Url> {
        if room.is_empty() {
            return Err(SyncError::Construction("Room code is empty".to_string()));
        }
        let mut url = Url::parse(self.endpoint())
            .map_err(|e| SyncError::Construction(format!("Invalid URL: {}", e)))?;
        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(SyncError::Construction(format!(
                "Invalid WebSocket URL scheme: {}",
                url.scheme()
            )));
        }
        url.set_path(WS_PATH);
        url.set_query(None);
        url.query_pairs_mut().append_pair("room", room);
        Ok(url)
    }
}
