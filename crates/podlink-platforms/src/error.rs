use thiserror::Error;

/// Errors surfaced by platform adapters.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP 429 — the platform asked us to back off.
    #[error("{platform} rate limited (retry after {retry_after_secs}s)")]
    RateLimited {
        platform: &'static str,
        retry_after_secs: u64,
    },

    /// HTTP 401/403 — the token was rejected. Permanent until refresh or
    /// reconnect; never retried at the call site.
    #[error("{platform} rejected credentials: {message}")]
    Auth {
        platform: &'static str,
        message: String,
    },

    /// Any other non-2xx response.
    #[error("{platform} API error (status {status}): {message}")]
    Api {
        platform: &'static str,
        status: u16,
        message: String,
    },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The platform has no endpoint for this operation (e.g. revoke, or
    /// refresh under a non-expiring scheme).
    #[error("{platform} does not support {operation}")]
    Unsupported {
        platform: &'static str,
        operation: &'static str,
    },

    /// No app credentials are configured for the platform.
    #[error("platform {platform} is not configured")]
    NotConfigured { platform: &'static str },
}

impl AdapterError {
    /// Returns `true` for errors worth retrying after a back-off delay.
    ///
    /// **Retriable:** network-level failures, HTTP 429, and HTTP 5xx.
    ///
    /// **Not retriable:** auth rejections (4xx — a retry sends the same bad
    /// token), other 4xx responses, malformed bodies, unsupported or
    /// unconfigured operations.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            AdapterError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            AdapterError::RateLimited { .. } => true,
            AdapterError::Api { status, .. } => *status >= 500,
            AdapterError::Auth { .. }
            | AdapterError::Deserialize { .. }
            | AdapterError::Unsupported { .. }
            | AdapterError::NotConfigured { .. } => false,
        }
    }

    /// Returns `true` when the platform explicitly classified this as a
    /// permanent credential rejection — the one case where a failed refresh
    /// marks the credential `invalid` instead of `expired`.
    #[must_use]
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, AdapterError::Auth { .. })
    }
}
