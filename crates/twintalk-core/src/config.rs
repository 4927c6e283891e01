//! Runtime configuration, read from environment variables.
//!
//! This is plumbing only (a struct plus defaults) — it does not bootstrap a
//! process or parse a config file, which stays out of scope for the core.

use std::time::Duration;

/// Paging default applied when a façade caller omits `offset`/`limit`.
pub const DEFAULT_OFFSET: u64 = 0;
pub const DEFAULT_LIMIT: u64 = 10;

/// Hard ceiling on `limit` for any paged query.
pub const MAX_LIMIT: u64 = 100;

/// Hard ceiling on twin/attribute `Name` length.
pub const MAX_NAME_LEN: usize = 1024;

/// Default minimum inter-sample interval when a definition doesn't specify one.
pub const DEFAULT_DELTA_NS: i64 = 1_000_000; // 1 ms

#[derive(Debug, Clone)]
pub struct Config {
    /// Channel the service publishes lifecycle notifications on. Empty/unset disables them.
    pub notification_channel: Option<String>,
    pub broker_url: String,
    pub identity_url: String,
    pub identity_timeout: Duration,
    pub cache_url: Option<String>,
    pub registry_url: Option<String>,
    pub http_port: u16,
    /// Single-tenant standalone identity: a fixed (email, token) pair.
    pub standalone_email: Option<String>,
    pub standalone_token: Option<String>,
}

impl Config {
    /// Build configuration from environment variables, falling back to
    /// development defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            notification_channel: env_string("TWINTALK_NOTIFICATION_CHANNEL"),
            broker_url: env_string("TWINTALK_BROKER_URL")
                .unwrap_or_else(|| "nats://localhost:4222".to_string()),
            identity_url: env_string("TWINTALK_IDENTITY_URL")
                .unwrap_or_else(|| "http://localhost:9003".to_string()),
            identity_timeout: Duration::from_millis(
                env_string("TWINTALK_IDENTITY_TIMEOUT_MS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1000),
            ),
            cache_url: env_string("TWINTALK_CACHE_URL"),
            registry_url: env_string("TWINTALK_REGISTRY_URL"),
            http_port: env_string("TWINTALK_HTTP_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(9021),
            standalone_email: env_string("TWINTALK_STANDALONE_EMAIL"),
            standalone_token: env_string("TWINTALK_STANDALONE_TOKEN"),
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
