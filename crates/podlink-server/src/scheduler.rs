//! Background task scheduler.
//!
//! Initialises a [`JobScheduler`] at startup and registers the five
//! periodic tasks: sync dispatch, recurrence promotion, publication
//! dispatch, adaptive metrics, and the daily channel-stats snapshot. Each
//! registration owns a skip-if-running guard so a slow tick defers the next
//! one instead of stacking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use podlink_engine::{metrics, publish, sync, EngineContext, RunningJobs};

/// Every 5 minutes.
const SYNC_DISPATCH_CRON: &str = "0 */5 * * * *";
/// Hourly, at minute 5.
const RECURRENCE_CRON: &str = "0 5 * * * *";
/// Every minute.
const PUBLICATION_CRON: &str = "0 * * * * *";
/// Hourly, at minute 10.
const ADAPTIVE_METRICS_CRON: &str = "0 10 * * * *";
/// Daily at 04:30 UTC.
const CHANNEL_STATS_CRON: &str = "0 30 4 * * *";

/// Builds and starts the background task scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process — dropping it shuts down all tasks.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a task cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(ctx: EngineContext) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_sync_dispatch(&scheduler, ctx.clone()).await?;
    register_recurrence(&scheduler, ctx.clone()).await?;
    register_publication_dispatch(&scheduler, ctx.clone()).await?;
    register_adaptive_metrics(&scheduler, ctx.clone()).await?;
    register_channel_stats(&scheduler, ctx).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// A compare-exchange guard: the tick body runs only when the previous
/// firing has finished.
fn try_enter(guard: &AtomicBool, task: &str) -> bool {
    if guard
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        tracing::warn!(task, "tick skipped; previous tick still running");
        return false;
    }
    true
}

async fn register_sync_dispatch(
    scheduler: &JobScheduler,
    ctx: EngineContext,
) -> Result<(), JobSchedulerError> {
    let running = Arc::new(RunningJobs::new());
    let guard = Arc::new(AtomicBool::new(false));

    let job = Job::new_async(SYNC_DISPATCH_CRON, move |_uuid, _lock| {
        let ctx = ctx.clone();
        let running = Arc::clone(&running);
        let guard = Arc::clone(&guard);

        Box::pin(async move {
            if !try_enter(&guard, "sync_dispatch") {
                return;
            }
            sync::run_sync_dispatch_tick(&ctx, &running).await;
            guard.store(false, Ordering::SeqCst);
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

async fn register_recurrence(
    scheduler: &JobScheduler,
    ctx: EngineContext,
) -> Result<(), JobSchedulerError> {
    let guard = Arc::new(AtomicBool::new(false));

    let job = Job::new_async(RECURRENCE_CRON, move |_uuid, _lock| {
        let ctx = ctx.clone();
        let guard = Arc::clone(&guard);

        Box::pin(async move {
            if !try_enter(&guard, "recurrence") {
                return;
            }
            sync::run_recurrence_tick(&ctx).await;
            guard.store(false, Ordering::SeqCst);
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

async fn register_publication_dispatch(
    scheduler: &JobScheduler,
    ctx: EngineContext,
) -> Result<(), JobSchedulerError> {
    let guard = Arc::new(AtomicBool::new(false));

    let job = Job::new_async(PUBLICATION_CRON, move |_uuid, _lock| {
        let ctx = ctx.clone();
        let guard = Arc::clone(&guard);

        Box::pin(async move {
            if !try_enter(&guard, "publication_dispatch") {
                return;
            }
            publish::run_publication_tick(&ctx).await;
            guard.store(false, Ordering::SeqCst);
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

async fn register_adaptive_metrics(
    scheduler: &JobScheduler,
    ctx: EngineContext,
) -> Result<(), JobSchedulerError> {
    let guard = Arc::new(AtomicBool::new(false));

    let job = Job::new_async(ADAPTIVE_METRICS_CRON, move |_uuid, _lock| {
        let ctx = ctx.clone();
        let guard = Arc::clone(&guard);

        Box::pin(async move {
            if !try_enter(&guard, "adaptive_metrics") {
                return;
            }
            metrics::run_adaptive_metrics_tick(&ctx).await;
            guard.store(false, Ordering::SeqCst);
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

async fn register_channel_stats(
    scheduler: &JobScheduler,
    ctx: EngineContext,
) -> Result<(), JobSchedulerError> {
    let guard = Arc::new(AtomicBool::new(false));

    let job = Job::new_async(CHANNEL_STATS_CRON, move |_uuid, _lock| {
        let ctx = ctx.clone();
        let guard = Arc::clone(&guard);

        Box::pin(async move {
            if !try_enter(&guard, "channel_stats") {
                return;
            }
            metrics::run_daily_channel_stats_tick(&ctx).await;
            guard.store(false, Ordering::SeqCst);
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_blocks_reentry_until_released() {
        let guard = AtomicBool::new(false);
        assert!(try_enter(&guard, "test"));
        assert!(!try_enter(&guard, "test"), "second entry must be refused");
        guard.store(false, Ordering::SeqCst);
        assert!(try_enter(&guard, "test"));
    }
}
