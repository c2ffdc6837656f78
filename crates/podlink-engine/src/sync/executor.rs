//! Execution of one claimed sync job.
//!
//! Pipeline: paginate the channel listing into light-weight stubs, fetch
//! full detail in platform-page-size batches, upsert each item, optionally
//! harvest comment threads, and persist progress after every batch. One bad
//! item never aborts its batch; an exhausted page retry gives up on the
//! remaining pages and continues with what was collected. The job status is
//! re-read at batch boundaries so an external cancellation stops the run
//! while keeping already-persisted progress.

use chrono::Utc;
use podlink_core::Platform;
use podlink_db::{NewComment, NewContentItem, SyncJobRow};
use podlink_platforms::{retry_with_backoff, CommentThread, ContentStub, PlatformAdapter};

use crate::sync::next_execution_after;
use crate::{EngineContext, EngineError};

/// Guard against a platform feeding cursors forever.
const MAX_PAGES: usize = 200;

/// Counters mirrored into the job row after every batch.
#[derive(Debug, Default, Clone, Copy)]
struct Progress {
    total: i32,
    processed: i32,
    succeeded: i32,
    errored: i32,
}

enum RunOutcome {
    Completed(Progress),
    Canceled,
}

/// Runs a claimed job to a terminal state.
///
/// Never returns an error: unrecoverable failures mark the job `failed` with
/// the captured detail, and both terminal paths arm recurrence when the job
/// carries a descriptor.
pub async fn execute_sync_job(ctx: &EngineContext, job: SyncJobRow) {
    let started = std::time::Instant::now();
    job_log(ctx, job.id, "info", &format!("{} started", job.job_type)).await;

    let mut terminal_is_canceled = false;
    match run_sync(ctx, &job).await {
        Ok(RunOutcome::Completed(progress)) => {
            if let Err(e) = podlink_db::complete_sync_job(&ctx.pool, job.id).await {
                tracing::error!(job_id = job.id, error = %e, "sync: failed to mark job completed");
            }
            job_log(
                ctx,
                job.id,
                "info",
                &format!(
                    "completed in {}s: {} of {} items synced, {} errored",
                    started.elapsed().as_secs(),
                    progress.succeeded,
                    progress.total,
                    progress.errored
                ),
            )
            .await;
        }
        Ok(RunOutcome::Canceled) => {
            terminal_is_canceled = true;
            job_log(ctx, job.id, "info", "canceled; partial progress retained").await;
        }
        Err(e) => {
            if let Err(mark_err) = podlink_db::fail_sync_job(&ctx.pool, job.id, &e.to_string()).await
            {
                tracing::error!(job_id = job.id, error = %mark_err, "sync: failed to mark job failed");
            }
            job_log(ctx, job.id, "error", &format!("failed: {e}")).await;
        }
    }

    // Completion and failure both reschedule; cancellation does not.
    if !terminal_is_canceled {
        if let (Some(freq), Some(interval)) = (&job.recurrence_freq, job.recurrence_interval) {
            if let Some(next) = next_execution_after(freq, interval, Utc::now()) {
                if let Err(e) = podlink_db::set_next_execution(&ctx.pool, job.id, Some(next)).await
                {
                    tracing::error!(job_id = job.id, error = %e, "sync: failed to arm recurrence");
                }
            }
        }
    }
}

async fn run_sync(ctx: &EngineContext, job: &SyncJobRow) -> Result<RunOutcome, EngineError> {
    let platform = Platform::parse(&job.platform)
        .ok_or_else(|| EngineError::UnknownPlatform(job.platform.clone()))?;
    let adapter = ctx.adapters.get(platform)?;
    let token = ctx
        .tokens
        .authorized_token(platform, job.user_id)
        .await?
        .ok_or(EngineError::NotConnected(platform.as_str()))?;

    let mut progress = Progress::default();

    // Phase 1: paginate the listing end-to-end into stubs.
    let listing = collect_stubs(
        adapter.as_ref(),
        &token,
        &job.channel_id,
        job.since,
        job.item_limit,
        ctx.config.max_retries,
        ctx.config.retry_backoff_base_ms,
    )
    .await;
    if let Some(warning) = &listing.abandoned {
        job_log(ctx, job.id, "warn", warning).await;
    }
    let stubs = listing.stubs;

    progress.total = i32::try_from(stubs.len()).unwrap_or(i32::MAX);
    write_progress(ctx, job.id, progress).await;
    job_log(
        ctx,
        job.id,
        "info",
        &format!("listing complete: {} items to process", stubs.len()),
    )
    .await;

    // Phase 2: detail fetch + upsert, in platform-page-size batches
    // (globally capped by config).
    let batch_size = adapter.page_size().min(ctx.config.sync_batch_size).max(1);
    let mut synced_ids: Vec<String> = Vec::new();
    for batch in stubs.chunks(batch_size) {
        if job_canceled(ctx, job.id).await {
            return Ok(RunOutcome::Canceled);
        }

        let ids: Vec<String> = batch.iter().map(|s| s.external_id.clone()).collect();
        let details = retry_with_backoff(ctx.config.max_retries, ctx.config.retry_backoff_base_ms, || {
            adapter.fetch_content_detail(&token, &ids)
        })
        .await;

        match details {
            Ok(items) => {
                for stub in batch {
                    let Some(item) = items.iter().find(|i| i.external_id == stub.external_id)
                    else {
                        progress.errored += 1;
                        continue;
                    };
                    let new_item = NewContentItem {
                        user_id: job.user_id,
                        channel_id: job.channel_id.clone(),
                        platform: job.platform.clone(),
                        external_id: item.external_id.clone(),
                        title: item.title.clone(),
                        description: item.description.clone(),
                        published_at: item.published_at,
                        metrics: item.metrics,
                    };
                    match podlink_db::upsert_content_item(
                        &ctx.pool,
                        &new_item,
                        ctx.config.metrics_history_cap,
                    )
                    .await
                    {
                        Ok(_) => {
                            progress.succeeded += 1;
                            synced_ids.push(item.external_id.clone());
                        }
                        Err(e) => {
                            progress.errored += 1;
                            tracing::warn!(
                                job_id = job.id,
                                external_id = %item.external_id,
                                error = %e,
                                "sync: item upsert failed; continuing"
                            );
                        }
                    }
                }
            }
            Err(e) => {
                // The whole batch is lost but the job goes on.
                progress.errored += i32::try_from(batch.len()).unwrap_or(i32::MAX);
                job_log(
                    ctx,
                    job.id,
                    "warn",
                    &format!("detail fetch failed for a batch of {}: {e}", batch.len()),
                )
                .await;
            }
        }

        progress.processed += i32::try_from(batch.len()).unwrap_or(i32::MAX);
        write_progress(ctx, job.id, progress).await;
    }

    // Phase 3: optional comment harvest for successfully synced items.
    if job.include_comments || job.job_type == "comments_sync" {
        let cap = job
            .comment_limit
            .and_then(|limit| usize::try_from(limit).ok())
            .unwrap_or(ctx.config.comments_per_item_cap);
        for external_id in &synced_ids {
            if job_canceled(ctx, job.id).await {
                return Ok(RunOutcome::Canceled);
            }
            if let Err(e) =
                harvest_item_comments(ctx, adapter.as_ref(), &token, job, external_id, cap).await
            {
                tracing::warn!(
                    job_id = job.id,
                    external_id = %external_id,
                    error = %e,
                    "sync: comment harvest failed for item; continuing"
                );
            }
        }
    }

    Ok(RunOutcome::Completed(progress))
}

/// Result of paginating a channel listing.
struct Listing {
    stubs: Vec<ContentStub>,
    /// Set when a page fetch was abandoned after retries — the run continues
    /// with what was collected.
    abandoned: Option<String>,
}

/// Paginates the channel listing end-to-end, accumulating stubs.
///
/// A page fetch that still fails after retries gives up on the remaining
/// pages — the cursor for them is gone — and returns what was collected.
/// Stubs older than `since` are dropped and `item_limit` truncates the tail.
async fn collect_stubs(
    adapter: &dyn PlatformAdapter,
    token: &str,
    channel_ref: &str,
    since: Option<chrono::DateTime<Utc>>,
    item_limit: Option<i32>,
    max_retries: u32,
    backoff_base_ms: u64,
) -> Listing {
    let mut stubs: Vec<ContentStub> = Vec::new();
    let mut abandoned = None;
    let mut page_token: Option<String> = None;
    let mut page_count = 0usize;

    loop {
        page_count += 1;
        if page_count > MAX_PAGES {
            abandoned = Some(format!(
                "page limit {MAX_PAGES} reached; stopping listing with {} collected items",
                stubs.len()
            ));
            break;
        }

        let page = retry_with_backoff(max_retries, backoff_base_ms, || {
            adapter.list_content(token, channel_ref, page_token.as_deref())
        })
        .await;

        let page = match page {
            Ok(page) => page,
            Err(e) => {
                abandoned = Some(format!(
                    "page {page_count} fetch failed after retries: {e}; continuing with {} collected items",
                    stubs.len()
                ));
                break;
            }
        };

        let items = match since {
            Some(since) => page
                .items
                .into_iter()
                .filter(|s| s.published_at.is_none_or(|p| p >= since))
                .collect(),
            None => page.items,
        };
        stubs.extend(items);

        if let Some(limit) = item_limit.and_then(|l| usize::try_from(l).ok()) {
            if stubs.len() >= limit {
                stubs.truncate(limit);
                break;
            }
        }

        page_token = page.next_page_token;
        if page_token.is_none() {
            break;
        }
    }

    Listing { stubs, abandoned }
}

/// Fetches comment threads (with one level of replies) for an item, up to
/// `cap` comments, and upserts each one.
async fn harvest_item_comments(
    ctx: &EngineContext,
    adapter: &dyn PlatformAdapter,
    token: &str,
    job: &SyncJobRow,
    item_external_id: &str,
    cap: usize,
) -> Result<(), EngineError> {
    let content_item_id =
        podlink_db::get_content_item_id(&ctx.pool, job.user_id, item_external_id).await?;

    let mut harvested = 0usize;
    let mut page_token: Option<String> = None;

    while harvested < cap {
        let page = retry_with_backoff(ctx.config.max_retries, ctx.config.retry_backoff_base_ms, || {
            adapter.list_comments(token, item_external_id, page_token.as_deref())
        })
        .await?;

        for thread in &page.threads {
            if harvested >= cap {
                break;
            }
            for comment in flatten_thread(thread) {
                if harvested >= cap {
                    break;
                }
                if let Err(e) =
                    podlink_db::upsert_comment(&ctx.pool, content_item_id, &comment).await
                {
                    tracing::warn!(
                        job_id = job.id,
                        comment_id = %comment.external_id,
                        error = %e,
                        "sync: comment upsert failed; continuing"
                    );
                } else {
                    harvested += 1;
                }
            }
        }

        page_token = page.next_page_token;
        if page_token.is_none() {
            break;
        }
    }

    Ok(())
}

/// A thread flattened into its top-level comment followed by its replies.
fn flatten_thread(thread: &CommentThread) -> Vec<NewComment> {
    let mut comments = Vec::with_capacity(1 + thread.replies.len());
    comments.push(NewComment {
        external_id: thread.external_id.clone(),
        author: thread.author.clone(),
        text: thread.text.clone(),
        like_count: thread.like_count,
        parent_external_id: None,
        published_at: thread.published_at,
    });
    for reply in &thread.replies {
        comments.push(NewComment {
            external_id: reply.external_id.clone(),
            author: reply.author.clone(),
            text: reply.text.clone(),
            like_count: reply.like_count,
            parent_external_id: Some(thread.external_id.clone()),
            published_at: reply.published_at,
        });
    }
    comments
}

async fn job_canceled(ctx: &EngineContext, job_id: i64) -> bool {
    match podlink_db::get_sync_job_status(&ctx.pool, job_id).await {
        Ok(status) => status == "canceled",
        Err(e) => {
            tracing::error!(job_id, error = %e, "sync: status poll failed; assuming not canceled");
            false
        }
    }
}

async fn write_progress(ctx: &EngineContext, job_id: i64, progress: Progress) {
    if let Err(e) = podlink_db::update_sync_progress(
        &ctx.pool,
        job_id,
        progress.total,
        progress.processed,
        progress.succeeded,
        progress.errored,
    )
    .await
    {
        tracing::error!(job_id, error = %e, "sync: progress update failed");
    }
}

async fn job_log(ctx: &EngineContext, job_id: i64, level: &str, message: &str) {
    if let Err(e) = podlink_db::append_sync_job_log(&ctx.pool, job_id, level, message).await {
        tracing::error!(job_id, error = %e, "sync: job log append failed");
    }
}
