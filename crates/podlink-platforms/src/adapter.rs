//! The platform adapter contract.
//!
//! One implementation per external platform sits behind [`PlatformAdapter`];
//! the token manager, sync executor, publication dispatcher, and metrics
//! collector depend only on this trait, never on a platform's concrete
//! shape. Pagination and rate-limit quirks live behind this boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use podlink_core::{EngagementSnapshot, Platform};
use serde::Deserialize;

use crate::error::AdapterError;

/// Token material returned by a code exchange or refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Declared lifetime in seconds; absent for non-expiring schemes.
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
}

/// Public profile of the connected account.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteProfile {
    pub id: String,
    pub handle: Option<String>,
    pub display_name: Option<String>,
}

/// Content payload handed to a platform's publish operation.
#[derive(Debug, Clone)]
pub struct PublishContent {
    pub title: String,
    pub description: Option<String>,
    pub media_ref: Option<String>,
}

/// Platform-assigned identity of freshly published content.
#[derive(Debug, Clone, Deserialize)]
pub struct PublishReceipt {
    pub platform_content_id: String,
    pub url: String,
}

/// Light-weight item stub from a content listing page.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentStub {
    pub external_id: String,
    pub title: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// One page of a channel's content listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentPage {
    pub items: Vec<ContentStub>,
    pub next_page_token: Option<String>,
}

/// Full detail for one content item, fetched in batches.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteContentItem {
    pub external_id: String,
    pub title: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metrics: EngagementSnapshot,
}

/// A reply inside a comment thread (one level deep).
#[derive(Debug, Clone, Deserialize)]
pub struct CommentReply {
    pub external_id: String,
    pub author: Option<String>,
    pub text: String,
    #[serde(default)]
    pub like_count: i64,
    pub published_at: Option<DateTime<Utc>>,
}

/// A top-level comment with its first level of replies.
#[derive(Debug, Clone, Deserialize)]
pub struct CommentThread {
    pub external_id: String,
    pub author: Option<String>,
    pub text: String,
    #[serde(default)]
    pub like_count: i64,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub replies: Vec<CommentReply>,
}

/// One page of comment threads for an item.
#[derive(Debug, Clone, Deserialize)]
pub struct CommentPage {
    pub threads: Vec<CommentThread>,
    pub next_page_token: Option<String>,
}

/// The capability set every platform integration must satisfy.
///
/// All operations take the decrypted access token explicitly — adapters hold
/// app credentials (client id/secret) but never user token material.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Platform page-size limit for listings and detail batches.
    fn page_size(&self) -> usize;

    /// Exchanges an OAuth authorization code for token material.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant, AdapterError>;

    /// Obtains fresh token material.
    ///
    /// `refresh_material` is the refresh token, or the current access token
    /// for exchange-style schemes. Non-expiring schemes return
    /// [`AdapterError::Unsupported`].
    async fn refresh(&self, refresh_material: &str) -> Result<TokenGrant, AdapterError>;

    /// Best-effort remote revocation. Platforms without a revocation
    /// endpoint return [`AdapterError::Unsupported`].
    async fn revoke(&self, access_token: &str) -> Result<(), AdapterError>;

    async fn fetch_profile(&self, access_token: &str) -> Result<RemoteProfile, AdapterError>;

    async fn publish(
        &self,
        access_token: &str,
        content: &PublishContent,
    ) -> Result<PublishReceipt, AdapterError>;

    /// Engagement counters for one piece of content — or for a whole
    /// channel when `content_ref` is a channel/profile id.
    async fn fetch_metrics(
        &self,
        access_token: &str,
        content_ref: &str,
    ) -> Result<EngagementSnapshot, AdapterError>;

    async fn list_content(
        &self,
        access_token: &str,
        channel_ref: &str,
        page_token: Option<&str>,
    ) -> Result<ContentPage, AdapterError>;

    async fn fetch_content_detail(
        &self,
        access_token: &str,
        ids: &[String],
    ) -> Result<Vec<RemoteContentItem>, AdapterError>;

    async fn list_comments(
        &self,
        access_token: &str,
        item_id: &str,
        page_token: Option<&str>,
    ) -> Result<CommentPage, AdapterError>;
}
