use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod app_config;
pub mod config;
pub mod platform;

pub use app_config::{AppConfig, ClientCredentials, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use platform::{AuthScheme, Platform};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for env var {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

/// A point-in-time engagement snapshot for one piece of content or one
/// channel. The unit of comparison for metric-history appends and the
/// payload returned by every adapter metrics fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementSnapshot {
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
}

impl EngagementSnapshot {
    /// True when every counter is zero — the seed state for new records.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.views == 0 && self.likes == 0 && self.comments == 0 && self.shares == 0
    }
}
