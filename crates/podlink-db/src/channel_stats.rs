//! Database operations for the `channel_stats` table.
//!
//! One row per `(user, platform, day)` — the dated channel-level totals the
//! trend charts read. The upsert keys on the day so a rerun of the daily
//! collection pass overwrites instead of duplicating.

use chrono::{DateTime, NaiveDate, Utc};
use podlink_core::EngagementSnapshot;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `channel_stats` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChannelStatsRow {
    pub id: i64,
    pub user_id: i64,
    pub platform: String,
    pub snapshot_date: NaiveDate,
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub created_at: DateTime<Utc>,
}

/// Upserts the channel-level totals for `(user, platform)` on `snapshot_date`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_channel_stats_snapshot(
    pool: &PgPool,
    user_id: i64,
    platform: &str,
    snapshot_date: NaiveDate,
    totals: &EngagementSnapshot,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO channel_stats (user_id, platform, snapshot_date, views, likes, comments, shares) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (user_id, platform, snapshot_date) DO UPDATE SET \
             views    = EXCLUDED.views, \
             likes    = EXCLUDED.likes, \
             comments = EXCLUDED.comments, \
             shares   = EXCLUDED.shares",
    )
    .bind(user_id)
    .bind(platform)
    .bind(snapshot_date)
    .bind(totals.views)
    .bind(totals.likes)
    .bind(totals.comments)
    .bind(totals.shares)
    .execute(pool)
    .await?;
    Ok(())
}

/// Returns the most recent `limit` snapshots for `(user, platform)`, newest
/// first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_channel_stats(
    pool: &PgPool,
    user_id: i64,
    platform: &str,
    limit: i64,
) -> Result<Vec<ChannelStatsRow>, DbError> {
    let rows = sqlx::query_as::<_, ChannelStatsRow>(
        "SELECT id, user_id, platform, snapshot_date, views, likes, comments, shares, created_at \
         FROM channel_stats \
         WHERE user_id = $1 AND platform = $2 \
         ORDER BY snapshot_date DESC \
         LIMIT $3",
    )
    .bind(user_id)
    .bind(platform)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
