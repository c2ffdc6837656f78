//! Shared REST implementation of the platform adapter contract.
//!
//! Wraps `reqwest` with platform-specific endpoint wiring from
//! [`PlatformSpec`], uniform error mapping (429 → rate-limited, 401/403 →
//! auth rejection, other non-2xx → API error), and per-platform request
//! spacing. Use [`RestAdapter::new`] for production or
//! [`RestAdapter::with_base_url`] to point at a mock server in tests.

use std::time::Duration;

use async_trait::async_trait;
use podlink_core::{AuthScheme, ClientCredentials, EngagementSnapshot, Platform};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::adapter::{
    CommentPage, ContentPage, PlatformAdapter, PublishContent, PublishReceipt, RemoteContentItem,
    RemoteProfile, TokenGrant,
};
use crate::catalog::PlatformSpec;
use crate::error::AdapterError;
use crate::rate_limit::RequestGate;

const USER_AGENT: &str = "podlink/0.1 (podcast-presence)";

/// One platform's adapter: a `reqwest` client plus that platform's spec and
/// app credentials.
pub struct RestAdapter {
    spec: &'static PlatformSpec,
    http: Client,
    creds: ClientCredentials,
    base_url: Url,
    gate: RequestGate,
}

#[derive(serde::Deserialize)]
struct DetailEnvelope {
    items: Vec<RemoteContentItem>,
}

impl RestAdapter {
    /// Creates an adapter pointed at the platform's production API.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        spec: &'static PlatformSpec,
        creds: ClientCredentials,
        timeout_secs: u64,
    ) -> Result<Self, AdapterError> {
        Self::with_base_url(spec, creds, timeout_secs, spec.api_base)
    }

    /// Creates an adapter with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Http`] if the client cannot be constructed,
    /// or [`AdapterError::Api`] if `base_url` is not a valid URL.
    pub fn with_base_url(
        spec: &'static PlatformSpec,
        creds: ClientCredentials,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, AdapterError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()?;

        // Normalise: exactly one trailing slash so joins append rather than
        // replace the last path segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| AdapterError::Api {
            platform: spec.platform.as_str(),
            status: 0,
            message: format!("invalid base URL '{base_url}': {e}"),
        })?;

        Ok(Self {
            spec,
            http,
            creds,
            base_url,
            gate: RequestGate::new(spec.min_request_spacing_ms),
        })
    }

    fn platform_name(&self) -> &'static str {
        self.spec.platform.as_str()
    }

    fn url(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(path);
        url
    }

    /// Maps a non-success response to the adapter error taxonomy.
    async fn check_status(&self, response: Response) -> Result<Response, AdapterError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(AdapterError::RateLimited {
                platform: self.platform_name(),
                retry_after_secs,
            });
        }

        let message = response.text().await.unwrap_or_default();
        let message = message.chars().take(200).collect::<String>();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AdapterError::Auth {
                platform: self.platform_name(),
                message,
            });
        }

        Err(AdapterError::Api {
            platform: self.platform_name(),
            status: status.as_u16(),
            message,
        })
    }

    async fn parse_json<T: DeserializeOwned>(
        &self,
        response: Response,
        context: &str,
    ) -> Result<T, AdapterError> {
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| AdapterError::Deserialize {
            context: format!("{}.{context}", self.platform_name()),
            source: e,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        access_token: &str,
        path: &str,
        query: &[(&str, &str)],
        context: &str,
    ) -> Result<T, AdapterError> {
        self.gate.wait_turn().await;
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await?;
        let response = self.check_status(response).await?;
        self.parse_json(response, context).await
    }

    /// Form-encoded POST to the platform's token endpoint.
    async fn token_request(
        &self,
        form: &[(&str, &str)],
        context: &str,
    ) -> Result<TokenGrant, AdapterError> {
        self.gate.wait_turn().await;
        let response = self
            .http
            .post(self.url(self.spec.token_path))
            .form(form)
            .send()
            .await?;
        let response = self.check_status(response).await?;
        self.parse_json(response, context).await
    }
}

#[async_trait]
impl PlatformAdapter for RestAdapter {
    fn platform(&self) -> Platform {
        self.spec.platform
    }

    fn page_size(&self) -> usize {
        self.spec.page_size
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant, AdapterError> {
        self.token_request(
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", &self.creds.client_id),
                ("client_secret", &self.creds.client_secret),
            ],
            "exchange_code",
        )
        .await
    }

    async fn refresh(&self, refresh_material: &str) -> Result<TokenGrant, AdapterError> {
        match self.spec.platform.auth_scheme() {
            AuthScheme::OauthRefresh => {
                self.token_request(
                    &[
                        ("grant_type", "refresh_token"),
                        ("refresh_token", refresh_material),
                        ("client_id", &self.creds.client_id),
                        ("client_secret", &self.creds.client_secret),
                    ],
                    "refresh",
                )
                .await
            }
            // Long-lived token schemes renew by exchanging the current token.
            AuthScheme::OauthExchange => {
                self.token_request(
                    &[
                        ("grant_type", "exchange_token"),
                        ("access_token", refresh_material),
                        ("client_id", &self.creds.client_id),
                        ("client_secret", &self.creds.client_secret),
                    ],
                    "refresh",
                )
                .await
            }
            AuthScheme::SignedRequest => Err(AdapterError::Unsupported {
                platform: self.platform_name(),
                operation: "refresh",
            }),
        }
    }

    async fn revoke(&self, access_token: &str) -> Result<(), AdapterError> {
        let Some(revoke_path) = self.spec.revoke_path else {
            return Err(AdapterError::Unsupported {
                platform: self.platform_name(),
                operation: "revoke",
            });
        };

        self.gate.wait_turn().await;
        let response = self
            .http
            .post(self.url(revoke_path))
            .form(&[
                ("token", access_token),
                ("client_id", self.creds.client_id.as_str()),
                ("client_secret", self.creds.client_secret.as_str()),
            ])
            .send()
            .await?;
        self.check_status(response).await?;
        Ok(())
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<RemoteProfile, AdapterError> {
        self.get_json(access_token, "/v1/me", &[], "fetch_profile")
            .await
    }

    async fn publish(
        &self,
        access_token: &str,
        content: &PublishContent,
    ) -> Result<PublishReceipt, AdapterError> {
        self.gate.wait_turn().await;
        let body = serde_json::json!({
            "title": content.title,
            "description": content.description,
            "media_ref": content.media_ref,
        });
        let response = self
            .http
            .post(self.url("/v1/content"))
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await?;
        let response = self.check_status(response).await?;
        self.parse_json(response, "publish").await
    }

    async fn fetch_metrics(
        &self,
        access_token: &str,
        content_ref: &str,
    ) -> Result<EngagementSnapshot, AdapterError> {
        self.get_json(
            access_token,
            &format!("/v1/content/{content_ref}/metrics"),
            &[],
            "fetch_metrics",
        )
        .await
    }

    async fn list_content(
        &self,
        access_token: &str,
        channel_ref: &str,
        page_token: Option<&str>,
    ) -> Result<ContentPage, AdapterError> {
        let limit = self.spec.page_size.to_string();
        let mut query: Vec<(&str, &str)> = vec![("limit", limit.as_str())];
        if let Some(token) = page_token {
            query.push(("page_token", token));
        }
        self.get_json(
            access_token,
            &format!("/v1/channels/{channel_ref}/content"),
            &query,
            "list_content",
        )
        .await
    }

    async fn fetch_content_detail(
        &self,
        access_token: &str,
        ids: &[String],
    ) -> Result<Vec<RemoteContentItem>, AdapterError> {
        let joined = ids.join(",");
        let envelope: DetailEnvelope = self
            .get_json(
                access_token,
                "/v1/content",
                &[("ids", joined.as_str())],
                "fetch_content_detail",
            )
            .await?;
        Ok(envelope.items)
    }

    async fn list_comments(
        &self,
        access_token: &str,
        item_id: &str,
        page_token: Option<&str>,
    ) -> Result<CommentPage, AdapterError> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(token) = page_token {
            query.push(("page_token", token));
        }
        self.get_json(
            access_token,
            &format!("/v1/content/{item_id}/comments"),
            &query,
            "list_comments",
        )
        .await
    }
}
