//! Database operations for `sync_jobs` and `sync_job_logs`.
//!
//! Every status transition is a conditional `UPDATE ... WHERE status = ...`
//! whose `rows_affected` is checked. The `pending → processing` transition
//! ([`claim_sync_job`]) is the serialization point between racing scheduler
//! ticks: only one claimant's write succeeds.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `sync_jobs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SyncJobRow {
    pub id: i64,
    pub public_id: Uuid,
    pub user_id: i64,
    pub company_id: i64,
    pub channel_id: String,
    /// One of `full_sync`, `incremental_sync`, `stats_update`, `comments_sync`.
    pub job_type: String,
    pub platform: String,
    /// 0–10, higher runs first.
    pub priority: i16,
    pub item_limit: Option<i32>,
    pub since: Option<DateTime<Utc>>,
    pub include_comments: bool,
    pub comment_limit: Option<i32>,
    /// One of `pending`, `processing`, `completed`, `failed`, `canceled`.
    pub status: String,
    pub progress_total: i32,
    pub progress_processed: i32,
    pub progress_succeeded: i32,
    pub progress_errored: i32,
    pub scheduled_for: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    /// `hourly`, `daily`, or `weekly` when the job recurs.
    pub recurrence_freq: Option<String>,
    pub recurrence_interval: Option<i32>,
    pub next_execution: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A row from the append-only `sync_job_logs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SyncJobLogRow {
    pub id: i64,
    pub sync_job_id: i64,
    /// One of `info`, `warn`, `error`.
    pub level: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a new sync job.
#[derive(Debug, Clone)]
pub struct NewSyncJob {
    pub user_id: i64,
    pub company_id: i64,
    pub channel_id: String,
    pub job_type: String,
    pub platform: String,
    pub priority: i16,
    pub item_limit: Option<i32>,
    pub since: Option<DateTime<Utc>>,
    pub include_comments: bool,
    pub comment_limit: Option<i32>,
    pub scheduled_for: DateTime<Utc>,
    pub recurrence_freq: Option<String>,
    pub recurrence_interval: Option<i32>,
}

const SELECT_COLUMNS: &str = "id, public_id, user_id, company_id, channel_id, job_type, platform, \
     priority, item_limit, since, include_comments, comment_limit, status, \
     progress_total, progress_processed, progress_succeeded, progress_errored, \
     scheduled_for, started_at, completed_at, error_message, \
     recurrence_freq, recurrence_interval, next_execution, created_at";

// ---------------------------------------------------------------------------
// Creation and lookup
// ---------------------------------------------------------------------------

/// Returns `true` when a pending or processing job already exists for the
/// `(user, channel, job type)` triple.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn has_active_job(
    pool: &PgPool,
    user_id: i64,
    channel_id: &str,
    job_type: &str,
) -> Result<bool, DbError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS( \
             SELECT 1 FROM sync_jobs \
             WHERE user_id = $1 AND channel_id = $2 AND job_type = $3 \
               AND status IN ('pending', 'processing'))",
    )
    .bind(user_id)
    .bind(channel_id)
    .bind(job_type)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Creates a new sync job in `pending` status.
///
/// At most one pending/processing job may exist per `(user, channel, job
/// type)`; creation is rejected with [`DbError::ActiveJobExists`] when one
/// does.
///
/// # Errors
///
/// Returns [`DbError::ActiveJobExists`] on a duplicate active job, or
/// [`DbError::Sqlx`] if the insert fails.
pub async fn create_sync_job(pool: &PgPool, job: &NewSyncJob) -> Result<SyncJobRow, DbError> {
    if has_active_job(pool, job.user_id, &job.channel_id, &job.job_type).await? {
        return Err(DbError::ActiveJobExists {
            user_id: job.user_id,
            channel_id: job.channel_id.clone(),
            job_type: job.job_type.clone(),
        });
    }

    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, SyncJobRow>(&format!(
        "INSERT INTO sync_jobs \
             (public_id, user_id, company_id, channel_id, job_type, platform, priority, \
              item_limit, since, include_comments, comment_limit, status, scheduled_for, \
              recurrence_freq, recurrence_interval) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'pending', $12, $13, $14) \
         RETURNING {SELECT_COLUMNS}"
    ))
    .bind(public_id)
    .bind(job.user_id)
    .bind(job.company_id)
    .bind(&job.channel_id)
    .bind(&job.job_type)
    .bind(&job.platform)
    .bind(job.priority)
    .bind(job.item_limit)
    .bind(job.since)
    .bind(job.include_comments)
    .bind(job.comment_limit)
    .bind(job.scheduled_for)
    .bind(&job.recurrence_freq)
    .bind(job.recurrence_interval)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetches a single job by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_sync_job(pool: &PgPool, id: i64) -> Result<SyncJobRow, DbError> {
    let row = sqlx::query_as::<_, SyncJobRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM sync_jobs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Fetches only a job's current status — the executor polls this at batch
/// boundaries for cooperative cancellation.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_sync_job_status(pool: &PgPool, id: i64) -> Result<String, DbError> {
    let status: Option<String> = sqlx::query_scalar("SELECT status FROM sync_jobs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    status.ok_or(DbError::NotFound)
}

// ---------------------------------------------------------------------------
// Scheduler queries
// ---------------------------------------------------------------------------

/// Counts jobs currently in `processing`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_processing_jobs(pool: &PgPool) -> Result<i64, DbError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sync_jobs WHERE status = 'processing'")
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Returns up to `limit` due pending jobs, highest priority first, earlier
/// schedule time breaking ties.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_due_pending_jobs(pool: &PgPool, limit: i64) -> Result<Vec<SyncJobRow>, DbError> {
    let rows = sqlx::query_as::<_, SyncJobRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM sync_jobs \
         WHERE status = 'pending' AND scheduled_for <= NOW() \
         ORDER BY priority DESC, scheduled_for ASC, id ASC \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Atomically claims a pending job: `pending → processing`, `started_at = NOW()`.
///
/// Returns `true` if this caller won the claim; `false` means another tick
/// (or a cancellation) got there first — not an error.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn claim_sync_job(pool: &PgPool, id: i64) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE sync_jobs SET status = 'processing', started_at = NOW() \
         WHERE id = $1 AND status = 'pending'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Terminal jobs whose recurrence is due: completed or failed, with a
/// non-null `next_execution` at or before now.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recurring_due_jobs(pool: &PgPool) -> Result<Vec<SyncJobRow>, DbError> {
    let rows = sqlx::query_as::<_, SyncJobRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM sync_jobs \
         WHERE status IN ('completed', 'failed') \
           AND next_execution IS NOT NULL AND next_execution <= NOW() \
         ORDER BY next_execution ASC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Sets (or clears) a job's `next_execution`. Cleared after recurrence
/// promotion so the hourly scan cannot promote the same record twice.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn set_next_execution(
    pool: &PgPool,
    id: i64,
    next_execution: Option<DateTime<Utc>>,
) -> Result<(), DbError> {
    sqlx::query("UPDATE sync_jobs SET next_execution = $1 WHERE id = $2")
        .bind(next_execution)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Executor updates
// ---------------------------------------------------------------------------

/// Writes the four progress counters.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_sync_progress(
    pool: &PgPool,
    id: i64,
    total: i32,
    processed: i32,
    succeeded: i32,
    errored: i32,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE sync_jobs SET \
             progress_total = $1, progress_processed = $2, \
             progress_succeeded = $3, progress_errored = $4 \
         WHERE id = $5",
    )
    .bind(total)
    .bind(processed)
    .bind(succeeded)
    .bind(errored)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Marks a job `completed` and sets `completed_at = NOW()`.
///
/// A job with a nonzero error counter still completes — partial failure is a
/// valid terminal outcome, distinct from `failed`.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job was not `processing`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn complete_sync_job(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE sync_jobs SET status = 'completed', completed_at = NOW() \
         WHERE id = $1 AND status = 'processing'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidJobTransition {
            id,
            expected_status: "processing",
        });
    }

    Ok(())
}

/// Marks a job `failed` with the captured error detail.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job was not `processing`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn fail_sync_job(pool: &PgPool, id: i64, error_message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE sync_jobs SET status = 'failed', completed_at = NOW(), error_message = $1 \
         WHERE id = $2 AND status = 'processing'",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidJobTransition {
            id,
            expected_status: "processing",
        });
    }

    Ok(())
}

/// Cancels a job that is still `pending` or `processing`.
///
/// A processing job is not interrupted here — the executor notices the status
/// change at its next batch boundary and stops, keeping partial progress.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job was already terminal,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn cancel_sync_job(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE sync_jobs SET status = 'canceled', completed_at = NOW() \
         WHERE id = $1 AND status IN ('pending', 'processing')",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidJobTransition {
            id,
            expected_status: "pending or processing",
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Job logs
// ---------------------------------------------------------------------------

/// Appends one log entry for a job.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn append_sync_job_log(
    pool: &PgPool,
    sync_job_id: i64,
    level: &str,
    message: &str,
) -> Result<(), DbError> {
    sqlx::query("INSERT INTO sync_job_logs (sync_job_id, level, message) VALUES ($1, $2, $3)")
        .bind(sync_job_id)
        .bind(level)
        .bind(message)
        .execute(pool)
        .await?;
    Ok(())
}

/// Returns the most recent `limit` log entries for a job, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_sync_job_logs(
    pool: &PgPool,
    sync_job_id: i64,
    limit: i64,
) -> Result<Vec<SyncJobLogRow>, DbError> {
    let rows = sqlx::query_as::<_, SyncJobLogRow>(
        "SELECT id, sync_job_id, level, message, created_at \
         FROM sync_job_logs \
         WHERE sync_job_id = $1 \
         ORDER BY id DESC \
         LIMIT $2",
    )
    .bind(sync_job_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
