use std::collections::BTreeMap;

use crate::platform::Platform;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// OAuth application credentials for one platform.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    /// Base64-encoded 32-byte AES-256-GCM key for credential-at-rest
    /// encryption. Process-wide, never per-record.
    pub encryption_key: String,
    pub oauth_redirect_url: String,
    /// Platforms without configured app credentials are simply absent.
    pub platform_credentials: BTreeMap<Platform, ClientCredentials>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub max_concurrent_jobs: i64,
    pub sync_batch_size: usize,
    pub metrics_history_cap: usize,
    pub comments_per_item_cap: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("encryption_key", &"[redacted]")
            .field("oauth_redirect_url", &self.oauth_redirect_url)
            .field(
                "platform_credentials",
                &self.platform_credentials.keys().collect::<Vec<_>>(),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("max_concurrent_jobs", &self.max_concurrent_jobs)
            .field("sync_batch_size", &self.sync_batch_size)
            .field("metrics_history_cap", &self.metrics_history_cap)
            .field("comments_per_item_cap", &self.comments_per_item_cap)
            .finish()
    }
}
