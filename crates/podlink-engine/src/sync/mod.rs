//! Sync job dispatch and recurrence promotion.
//!
//! The dispatch tick claims due pending jobs up to the concurrency cap and
//! spawns one executor task per claim. The conditional `pending →
//! processing` update in the store is the serialization point; the
//! [`RunningJobs`] registry only guards against double-dispatch from this
//! process while a claim is in flight.

pub mod executor;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use podlink_db::NewSyncJob;

use crate::registry::RunningJobs;
use crate::EngineContext;

/// One dispatch tick: count running jobs, claim due pending jobs up to the
/// cap, spawn an executor per claim. A tick that finds the cap full simply
/// defers to the next period.
pub async fn run_sync_dispatch_tick(ctx: &EngineContext, running: &Arc<RunningJobs>) {
    let processing = match podlink_db::count_processing_jobs(&ctx.pool).await {
        Ok(n) => n,
        Err(e) => {
            tracing::error!(error = %e, "sync dispatch: failed to count processing jobs");
            return;
        }
    };

    let cap = ctx.config.max_concurrent_jobs;
    if processing >= cap {
        tracing::debug!(processing, cap, "sync dispatch: concurrency cap reached; deferring");
        return;
    }

    let due = match podlink_db::list_due_pending_jobs(&ctx.pool, cap - processing).await {
        Ok(jobs) => jobs,
        Err(e) => {
            tracing::error!(error = %e, "sync dispatch: failed to list due jobs");
            return;
        }
    };

    for job in due {
        if !running.insert(job.id) {
            tracing::warn!(job_id = job.id, "sync dispatch: job already dispatched; skipping");
            continue;
        }

        match podlink_db::claim_sync_job(&ctx.pool, job.id).await {
            Ok(true) => {
                tracing::info!(
                    job_id = job.id,
                    job_type = %job.job_type,
                    platform = %job.platform,
                    "sync dispatch: job claimed"
                );
                let job_id = job.id;
                let ctx = ctx.clone();
                let running = Arc::clone(running);
                tokio::spawn(async move {
                    executor::execute_sync_job(&ctx, job).await;
                    running.remove(job_id);
                });
            }
            Ok(false) => {
                // Lost the claim — another tick or a cancellation won.
                running.remove(job.id);
            }
            Err(e) => {
                running.remove(job.id);
                tracing::error!(job_id = job.id, error = %e, "sync dispatch: claim failed");
            }
        }
    }
}

/// Computes when the next occurrence of a recurring job should run,
/// counting from `from`.
#[must_use]
pub fn next_execution_after(
    freq: &str,
    interval: i32,
    from: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let interval = i64::from(interval.max(1));
    match freq {
        "hourly" => Some(from + Duration::hours(interval)),
        "daily" => Some(from + Duration::days(interval)),
        "weekly" => Some(from + Duration::weeks(interval)),
        _ => None,
    }
}

/// One recurrence tick: promote terminal recurring jobs whose
/// `next_execution` has arrived into fresh pending occurrences.
///
/// The new occurrence is a new record — terminal records are never reset,
/// preserving history. A triple that already has a pending/processing job is
/// left alone and re-examined on the next scan.
pub async fn run_recurrence_tick(ctx: &EngineContext) {
    let due = match podlink_db::list_recurring_due_jobs(&ctx.pool).await {
        Ok(jobs) => jobs,
        Err(e) => {
            tracing::error!(error = %e, "recurrence: failed to list due recurring jobs");
            return;
        }
    };

    for job in due {
        let active =
            match podlink_db::has_active_job(&ctx.pool, job.user_id, &job.channel_id, &job.job_type)
                .await
            {
                Ok(active) => active,
                Err(e) => {
                    tracing::error!(job_id = job.id, error = %e, "recurrence: existence check failed");
                    continue;
                }
            };
        if active {
            tracing::debug!(
                job_id = job.id,
                "recurrence: active job exists for triple; deferring promotion"
            );
            continue;
        }

        let next = NewSyncJob {
            user_id: job.user_id,
            company_id: job.company_id,
            channel_id: job.channel_id.clone(),
            job_type: job.job_type.clone(),
            platform: job.platform.clone(),
            priority: job.priority,
            item_limit: job.item_limit,
            since: job.since,
            include_comments: job.include_comments,
            comment_limit: job.comment_limit,
            scheduled_for: job.next_execution.unwrap_or_else(Utc::now),
            recurrence_freq: job.recurrence_freq.clone(),
            recurrence_interval: job.recurrence_interval,
        };

        match podlink_db::create_sync_job(&ctx.pool, &next).await {
            Ok(created) => {
                tracing::info!(
                    source_job_id = job.id,
                    new_job_id = created.id,
                    "recurrence: next occurrence created"
                );
                // Clear the source's pointer so the scan cannot promote the
                // same terminal record again.
                if let Err(e) = podlink_db::set_next_execution(&ctx.pool, job.id, None).await {
                    tracing::error!(job_id = job.id, error = %e, "recurrence: failed to clear next_execution");
                }
            }
            Err(e) => {
                tracing::error!(job_id = job.id, error = %e, "recurrence: failed to create occurrence");
            }
        }
    }
}
