//! Database operations for `content_items` and `content_comments`.
//!
//! The item upsert preserves a bounded per-item metrics timeline: when an
//! incoming snapshot differs from the stored one, the *previous* snapshot is
//! appended to the history array before being overwritten, and the oldest
//! entries are evicted past the cap. Identical snapshots leave the history
//! untouched, so re-syncing is idempotent.

use chrono::{DateTime, Utc};
use podlink_core::EngagementSnapshot;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `content_items` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContentItemRow {
    pub id: i64,
    pub user_id: i64,
    pub channel_id: String,
    pub platform: String,
    pub external_id: String,
    pub title: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    /// JSON array of [`HistoryPoint`], oldest first, bounded.
    pub metrics_history: serde_json::Value,
    pub last_synced_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One dated point in an item's metrics timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub captured_at: DateTime<Utc>,
}

impl HistoryPoint {
    #[must_use]
    pub fn from_snapshot(snapshot: &EngagementSnapshot, captured_at: DateTime<Utc>) -> Self {
        Self {
            views: snapshot.views,
            likes: snapshot.likes,
            comments: snapshot.comments,
            shares: snapshot.shares,
            captured_at,
        }
    }
}

/// A fetched remote item ready for persistence.
#[derive(Debug, Clone)]
pub struct NewContentItem {
    pub user_id: i64,
    pub channel_id: String,
    pub platform: String,
    pub external_id: String,
    pub title: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub metrics: EngagementSnapshot,
}

/// What the upsert did, so callers can log and count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentUpsertOutcome {
    Created,
    /// Metrics changed; the previous snapshot was appended to the history.
    UpdatedWithHistory,
    /// Metadata refreshed only; metrics were identical.
    Unchanged,
}

/// A fetched remote comment (top-level thread or one level of reply).
#[derive(Debug, Clone)]
pub struct NewComment {
    pub external_id: String,
    pub author: Option<String>,
    pub text: String,
    pub like_count: i64,
    /// Set on replies; `None` on top-level threads.
    pub parent_external_id: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// History helper
// ---------------------------------------------------------------------------

/// Appends `point` to `history`, evicting the oldest entries past `cap`.
///
/// Pure so the eviction rule is testable without a database.
#[must_use]
pub fn push_history(mut history: Vec<HistoryPoint>, point: HistoryPoint, cap: usize) -> Vec<HistoryPoint> {
    history.push(point);
    if history.len() > cap {
        let excess = history.len() - cap;
        history.drain(..excess);
    }
    history
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Upserts a fetched content item, maintaining the bounded metrics history.
///
/// Lookup is by `(user_id, external_id)`. On first sight the item is created
/// with the incoming snapshot seeded as history point zero. On re-sync with
/// changed metrics the previous snapshot is appended to the history (bounded
/// by `history_cap`) before the current columns are overwritten. On re-sync
/// with identical metrics only the metadata and `last_synced_at` move.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails.
pub async fn upsert_content_item(
    pool: &PgPool,
    item: &NewContentItem,
    history_cap: usize,
) -> Result<ContentUpsertOutcome, DbError> {
    let existing = sqlx::query_as::<_, ContentItemRow>(
        "SELECT id, user_id, channel_id, platform, external_id, title, description, \
                published_at, views, likes, comments, shares, metrics_history, \
                last_synced_at, created_at, updated_at \
         FROM content_items WHERE user_id = $1 AND external_id = $2",
    )
    .bind(item.user_id)
    .bind(&item.external_id)
    .fetch_optional(pool)
    .await?;

    let Some(existing) = existing else {
        let seed = vec![HistoryPoint::from_snapshot(&item.metrics, Utc::now())];
        sqlx::query(
            "INSERT INTO content_items \
                 (user_id, channel_id, platform, external_id, title, description, published_at, \
                  views, likes, comments, shares, metrics_history, last_synced_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW())",
        )
        .bind(item.user_id)
        .bind(&item.channel_id)
        .bind(&item.platform)
        .bind(&item.external_id)
        .bind(&item.title)
        .bind(&item.description)
        .bind(item.published_at)
        .bind(item.metrics.views)
        .bind(item.metrics.likes)
        .bind(item.metrics.comments)
        .bind(item.metrics.shares)
        .bind(serde_json::to_value(seed).unwrap_or_else(|_| serde_json::Value::Array(vec![])))
        .execute(pool)
        .await?;
        return Ok(ContentUpsertOutcome::Created);
    };

    let current = EngagementSnapshot {
        views: existing.views,
        likes: existing.likes,
        comments: existing.comments,
        shares: existing.shares,
    };

    if current == item.metrics {
        sqlx::query(
            "UPDATE content_items SET \
                 title = $1, description = $2, published_at = $3, \
                 last_synced_at = NOW(), updated_at = NOW() \
             WHERE id = $4",
        )
        .bind(&item.title)
        .bind(&item.description)
        .bind(item.published_at)
        .bind(existing.id)
        .execute(pool)
        .await?;
        return Ok(ContentUpsertOutcome::Unchanged);
    }

    let mut history: Vec<HistoryPoint> =
        serde_json::from_value(existing.metrics_history.clone()).unwrap_or_default();
    let previous = HistoryPoint::from_snapshot(&current, existing.last_synced_at);
    history = push_history(history, previous, history_cap);

    sqlx::query(
        "UPDATE content_items SET \
             title = $1, description = $2, published_at = $3, \
             views = $4, likes = $5, comments = $6, shares = $7, \
             metrics_history = $8, last_synced_at = NOW(), updated_at = NOW() \
         WHERE id = $9",
    )
    .bind(&item.title)
    .bind(&item.description)
    .bind(item.published_at)
    .bind(item.metrics.views)
    .bind(item.metrics.likes)
    .bind(item.metrics.comments)
    .bind(item.metrics.shares)
    .bind(serde_json::to_value(history).unwrap_or_else(|_| serde_json::Value::Array(vec![])))
    .bind(existing.id)
    .execute(pool)
    .await?;

    Ok(ContentUpsertOutcome::UpdatedWithHistory)
}

/// Upserts one harvested comment for a content item.
///
/// Conflicts on `(content_item_id, external_id)` refresh the mutable fields.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_comment(
    pool: &PgPool,
    content_item_id: i64,
    comment: &NewComment,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO content_comments \
             (content_item_id, external_id, author, text, like_count, parent_external_id, \
              published_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (content_item_id, external_id) DO UPDATE SET \
             author     = EXCLUDED.author, \
             text       = EXCLUDED.text, \
             like_count = EXCLUDED.like_count, \
             updated_at = NOW()",
    )
    .bind(content_item_id)
    .bind(&comment.external_id)
    .bind(&comment.author)
    .bind(&comment.text)
    .bind(comment.like_count)
    .bind(&comment.parent_external_id)
    .bind(comment.published_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Internal id of a stored content item, for comment attachment.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the item has not been synced, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_content_item_id(
    pool: &PgPool,
    user_id: i64,
    external_id: &str,
) -> Result<i64, DbError> {
    let id: Option<i64> =
        sqlx::query_scalar("SELECT id FROM content_items WHERE user_id = $1 AND external_id = $2")
            .bind(user_id)
            .bind(external_id)
            .fetch_optional(pool)
            .await?;

    id.ok_or(DbError::NotFound)
}
