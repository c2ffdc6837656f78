//! Engagement metrics collection.
//!
//! Two drivers: an hourly adaptive pass over published publications, and a
//! coarse daily pass that snapshots channel-level totals per connected
//! credential. The adaptive pass refreshes young content often and old
//! content rarely; when a group's credential is broken it falls back to a
//! deterministic synthetic-growth estimate, flagged as estimated, so charts
//! stay populated instead of blocking on a reconnect.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use podlink_core::{EngagementSnapshot, Platform};
use podlink_db::PublicationRow;
use podlink_platforms::retry_with_backoff;

use crate::EngineContext;

/// Base synthetic growth: 0.2% per hour for brand-new content, decaying
/// with age.
const SYNTHETIC_BASE_HOURLY_RATE: f64 = 0.002;

/// Synthetic growth per update never exceeds 10%.
const SYNTHETIC_MAX_FACTOR: f64 = 0.10;

/// Minimum time between metric refreshes for content of the given age.
///
/// Younger content changes fast and is polled often; older content barely
/// moves and is polled rarely.
#[must_use]
pub fn refresh_interval_for_age(age: Duration) -> Duration {
    if age < Duration::hours(24) {
        Duration::hours(1)
    } else if age < Duration::days(7) {
        Duration::hours(6)
    } else if age < Duration::days(30) {
        Duration::days(1)
    } else {
        Duration::weeks(1)
    }
}

/// Whether a publication's metrics are due for a refresh at `now`.
///
/// Never-updated metrics are always due.
#[must_use]
pub fn is_refresh_due(
    age: Duration,
    last_updated: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    match last_updated {
        None => true,
        Some(last) => now - last >= refresh_interval_for_age(age),
    }
}

/// Deterministic bounded growth estimate used when a credential is broken.
///
/// Applies an hourly rate that decays with content age, scaled by the time
/// since the last update and capped, so estimated curves stay smooth and
/// monotone without ever running away.
#[must_use]
pub fn estimate_growth(
    current: EngagementSnapshot,
    age_days: f64,
    hours_since_update: f64,
) -> EngagementSnapshot {
    let factor = (SYNTHETIC_BASE_HOURLY_RATE * hours_since_update.max(0.0)
        / (1.0 + age_days.max(0.0)))
    .min(SYNTHETIC_MAX_FACTOR);

    let grow = |value: i64| -> i64 {
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let delta = (value as f64 * factor).round() as i64;
        value.saturating_add(delta)
    };

    EngagementSnapshot {
        views: grow(current.views),
        likes: grow(current.likes),
        comments: grow(current.comments),
        shares: grow(current.shares),
    }
}

fn publication_age(publication: &PublicationRow, now: DateTime<Utc>) -> Duration {
    let born = publication.published_at.unwrap_or(publication.created_at);
    now - born
}

/// One adaptive pass over all published publications, grouped by
/// `(user, platform)` so each group costs one credential check.
pub async fn run_adaptive_metrics_tick(ctx: &EngineContext) {
    let publications = match podlink_db::list_published_publications(&ctx.pool).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!(error = %e, "metrics: failed to list published publications");
            return;
        }
    };

    let mut groups: BTreeMap<(i64, String), Vec<PublicationRow>> = BTreeMap::new();
    for publication in publications {
        groups
            .entry((publication.user_id, publication.platform.clone()))
            .or_default()
            .push(publication);
    }

    for ((user_id, platform_name), group) in groups {
        let Some(platform) = Platform::parse(&platform_name) else {
            tracing::warn!(platform = %platform_name, "metrics: unknown platform in group; skipping");
            continue;
        };
        refresh_group(ctx, user_id, platform, &group).await;
    }
}

/// Refreshes one `(user, platform)` group: measured fetches when the
/// credential is usable, synthetic estimates otherwise.
async fn refresh_group(
    ctx: &EngineContext,
    user_id: i64,
    platform: Platform,
    group: &[PublicationRow],
) {
    let token = match ctx.tokens.authorized_token(platform, user_id).await {
        Ok(token) => token,
        Err(e) => {
            tracing::error!(user_id, platform = %platform, error = %e, "metrics: credential check failed for group");
            return;
        }
    };

    let now = Utc::now();
    for publication in group {
        let age = publication_age(publication, now);
        if !is_refresh_due(age, publication.metrics_updated_at, now) {
            continue;
        }

        match &token {
            Some(token) => {
                refresh_measured(ctx, platform, token, publication).await;
            }
            None => {
                refresh_estimated(ctx, publication, age, now).await;
            }
        }
    }
}

async fn refresh_measured(
    ctx: &EngineContext,
    platform: Platform,
    token: &str,
    publication: &PublicationRow,
) {
    let Some(content_ref) = publication.platform_content_id.as_deref() else {
        tracing::warn!(
            publication_id = publication.id,
            "metrics: published record has no platform content id; skipping"
        );
        return;
    };

    let adapter = match ctx.adapters.get(platform) {
        Ok(adapter) => adapter,
        Err(e) => {
            tracing::warn!(publication_id = publication.id, error = %e, "metrics: no adapter for group");
            return;
        }
    };

    let fetched = retry_with_backoff(ctx.config.max_retries, ctx.config.retry_backoff_base_ms, || {
        adapter.fetch_metrics(token, content_ref)
    })
    .await;

    match fetched {
        Ok(metrics) => {
            if let Err(e) =
                podlink_db::update_publication_metrics(&ctx.pool, publication.id, &metrics, false)
                    .await
            {
                tracing::error!(publication_id = publication.id, error = %e, "metrics: update failed");
            }
        }
        Err(e) => {
            // Keep the last stored values; the next due pass tries again.
            tracing::warn!(
                publication_id = publication.id,
                platform = %platform,
                error = %e,
                "metrics: fetch failed; keeping previous values"
            );
        }
    }
}

#[allow(clippy::cast_precision_loss)]
async fn refresh_estimated(
    ctx: &EngineContext,
    publication: &PublicationRow,
    age: Duration,
    now: DateTime<Utc>,
) {
    let hours_since = publication
        .metrics_updated_at
        .map_or(1.0, |last| (now - last).num_minutes() as f64 / 60.0);
    let age_days = age.num_minutes() as f64 / (60.0 * 24.0);

    let estimated = estimate_growth(publication.metrics(), age_days, hours_since);
    if let Err(e) =
        podlink_db::update_publication_metrics(&ctx.pool, publication.id, &estimated, true).await
    {
        tracing::error!(publication_id = publication.id, error = %e, "metrics: estimate update failed");
    }
}

/// The daily pass: snapshot channel-level totals for every user with an
/// active credential on each platform.
pub async fn run_daily_channel_stats_tick(ctx: &EngineContext) {
    let today = Utc::now().date_naive();

    for platform in Platform::ALL {
        let credentials =
            match podlink_db::list_platform_credentials(&ctx.pool, platform.as_str(), "active")
                .await
            {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::error!(platform = %platform, error = %e, "metrics: failed to list credentials");
                    continue;
                }
            };

        for credential in credentials {
            let Some(channel_ref) = credential.profile_id.as_deref() else {
                continue;
            };

            let token = match ctx
                .tokens
                .authorized_token(platform, credential.user_id)
                .await
            {
                Ok(Some(token)) => token,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(user_id = credential.user_id, error = %e, "metrics: credential check failed");
                    continue;
                }
            };

            let adapter = match ctx.adapters.get(platform) {
                Ok(adapter) => adapter,
                Err(_) => continue,
            };

            let totals = retry_with_backoff(
                ctx.config.max_retries,
                ctx.config.retry_backoff_base_ms,
                || adapter.fetch_metrics(&token, channel_ref),
            )
            .await;

            match totals {
                Ok(totals) => {
                    if let Err(e) = podlink_db::upsert_channel_stats_snapshot(
                        &ctx.pool,
                        credential.user_id,
                        platform.as_str(),
                        today,
                        &totals,
                    )
                    .await
                    {
                        tracing::error!(user_id = credential.user_id, error = %e, "metrics: snapshot upsert failed");
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        user_id = credential.user_id,
                        platform = %platform,
                        error = %e,
                        "metrics: channel totals fetch failed"
                    );
                }
            }
        }
    }
}
