//! Live integration tests for podlink-db using `#[sqlx::test(migrations = "../../migrations")]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/podlink-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use chrono::{Duration, Utc};
use podlink_core::EngagementSnapshot;
use podlink_db::{
    cancel_sync_job, claim_sync_job, complete_sync_job, count_processing_jobs, create_publication,
    create_sync_job, fail_sync_job, get_credential, get_credential_with_secrets, get_publication,
    get_sync_job, has_active_job, list_due_pending_jobs, list_due_publications,
    list_recurring_due_jobs, mark_publication_failed, mark_publication_published,
    set_next_execution, update_sync_progress, upsert_content_item, upsert_credential, DbError,
    NewCredential, NewPublication, NewSyncJob, ProfileColumns,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_tokens(access: &str) -> NewCredential {
    NewCredential {
        access_token_enc: access.to_string(),
        refresh_token_enc: Some("enc-refresh".to_string()),
        expires_at: Some(Utc::now() + Duration::hours(1)),
        scope: Some("read".to_string()),
    }
}

fn new_job(user_id: i64, channel: &str, job_type: &str) -> NewSyncJob {
    NewSyncJob {
        user_id,
        company_id: 1,
        channel_id: channel.to_string(),
        job_type: job_type.to_string(),
        platform: "youtube".to_string(),
        priority: 5,
        item_limit: None,
        since: None,
        include_comments: false,
        comment_limit: None,
        scheduled_for: Utc::now() - Duration::minutes(1),
        recurrence_freq: None,
        recurrence_interval: None,
    }
}

fn new_publication(user_id: i64, minutes_ago: i64) -> NewPublication {
    NewPublication {
        user_id,
        platform: "spotify".to_string(),
        title: "Episode".to_string(),
        description: None,
        media_ref: None,
        scheduled_for: Utc::now() - Duration::minutes(minutes_ago),
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn credential_upsert_is_idempotent_per_user_platform(pool: sqlx::PgPool) {
    let first = upsert_credential(&pool, 1, "youtube", &new_tokens("enc-a"), &ProfileColumns::default())
        .await
        .unwrap();
    let second = upsert_credential(&pool, 1, "youtube", &new_tokens("enc-b"), &ProfileColumns::default())
        .await
        .unwrap();

    assert_eq!(first.id, second.id, "re-save must update, not duplicate");

    let secrets = get_credential_with_secrets(&pool, 1, "youtube")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(secrets.access_token_enc, "enc-b");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM credentials WHERE user_id = 1")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn credential_projection_without_secrets_has_profile(pool: sqlx::PgPool) {
    let profile = ProfileColumns {
        profile_id: Some("chan-42".to_string()),
        profile_handle: Some("thedailybrew".to_string()),
        profile_name: Some("The Daily Brew".to_string()),
    };
    upsert_credential(&pool, 2, "spotify", &new_tokens("enc"), &profile)
        .await
        .unwrap();

    let row = get_credential(&pool, 2, "spotify").await.unwrap().unwrap();
    assert_eq!(row.status, "active");
    assert_eq!(row.profile_id.as_deref(), Some("chan-42"));

    // A later token-only upsert keeps the stored profile.
    upsert_credential(&pool, 2, "spotify", &new_tokens("enc-2"), &ProfileColumns::default())
        .await
        .unwrap();
    let row = get_credential(&pool, 2, "spotify").await.unwrap().unwrap();
    assert_eq!(row.profile_handle.as_deref(), Some("thedailybrew"));
}

// ---------------------------------------------------------------------------
// Sync jobs
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn duplicate_active_job_is_rejected(pool: sqlx::PgPool) {
    create_sync_job(&pool, &new_job(1, "chan-1", "full_sync"))
        .await
        .unwrap();

    let result = create_sync_job(&pool, &new_job(1, "chan-1", "full_sync")).await;
    assert!(
        matches!(result, Err(DbError::ActiveJobExists { .. })),
        "expected ActiveJobExists, got: {result:?}"
    );

    // A different job type on the same channel is allowed.
    create_sync_job(&pool, &new_job(1, "chan-1", "comments_sync"))
        .await
        .unwrap();
    assert!(has_active_job(&pool, 1, "chan-1", "comments_sync").await.unwrap());
}

#[sqlx::test(migrations = "../../migrations")]
async fn claim_is_won_exactly_once(pool: sqlx::PgPool) {
    let job = create_sync_job(&pool, &new_job(1, "chan-1", "full_sync"))
        .await
        .unwrap();

    assert!(claim_sync_job(&pool, job.id).await.unwrap());
    assert!(
        !claim_sync_job(&pool, job.id).await.unwrap(),
        "second claimant must lose"
    );
    assert_eq!(count_processing_jobs(&pool).await.unwrap(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn due_jobs_are_ordered_by_priority_then_schedule_time(pool: sqlx::PgPool) {
    let mut low = new_job(1, "chan-low", "full_sync");
    low.priority = 2;
    low.scheduled_for = Utc::now() - Duration::minutes(30);
    let mut high = new_job(1, "chan-high", "full_sync");
    high.priority = 8;
    high.scheduled_for = Utc::now() - Duration::minutes(5);
    let mut high_earlier = new_job(1, "chan-high-earlier", "full_sync");
    high_earlier.priority = 8;
    high_earlier.scheduled_for = Utc::now() - Duration::minutes(10);
    let mut future = new_job(1, "chan-future", "full_sync");
    future.scheduled_for = Utc::now() + Duration::hours(1);

    for job in [&low, &high, &high_earlier, &future] {
        create_sync_job(&pool, job).await.unwrap();
    }

    let due = list_due_pending_jobs(&pool, 10).await.unwrap();
    let channels: Vec<&str> = due.iter().map(|j| j.channel_id.as_str()).collect();
    assert_eq!(channels, vec!["chan-high-earlier", "chan-high", "chan-low"]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn completed_with_errors_is_a_valid_terminal_state(pool: sqlx::PgPool) {
    let job = create_sync_job(&pool, &new_job(1, "chan-1", "full_sync"))
        .await
        .unwrap();
    claim_sync_job(&pool, job.id).await.unwrap();
    update_sync_progress(&pool, job.id, 120, 120, 117, 3).await.unwrap();
    complete_sync_job(&pool, job.id).await.unwrap();

    let row = get_sync_job(&pool, job.id).await.unwrap();
    assert_eq!(row.status, "completed");
    assert_eq!(row.progress_errored, 3);
    assert!(row.completed_at.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn terminal_transitions_require_processing(pool: sqlx::PgPool) {
    let job = create_sync_job(&pool, &new_job(1, "chan-1", "full_sync"))
        .await
        .unwrap();

    let result = complete_sync_job(&pool, job.id).await;
    assert!(matches!(result, Err(DbError::InvalidJobTransition { .. })));

    claim_sync_job(&pool, job.id).await.unwrap();
    fail_sync_job(&pool, job.id, "listing failed").await.unwrap();

    let row = get_sync_job(&pool, job.id).await.unwrap();
    assert_eq!(row.status, "failed");
    assert_eq!(row.error_message.as_deref(), Some("listing failed"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn cancel_reaches_pending_and_processing_only(pool: sqlx::PgPool) {
    let pending = create_sync_job(&pool, &new_job(1, "chan-1", "full_sync"))
        .await
        .unwrap();
    cancel_sync_job(&pool, pending.id).await.unwrap();
    assert_eq!(get_sync_job(&pool, pending.id).await.unwrap().status, "canceled");

    let result = cancel_sync_job(&pool, pending.id).await;
    assert!(
        matches!(result, Err(DbError::InvalidJobTransition { .. })),
        "canceling a terminal job must fail"
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn recurring_jobs_surface_when_next_execution_arrives(pool: sqlx::PgPool) {
    let mut job = new_job(1, "chan-1", "full_sync");
    job.recurrence_freq = Some("daily".to_string());
    job.recurrence_interval = Some(1);
    let job = create_sync_job(&pool, &job).await.unwrap();

    claim_sync_job(&pool, job.id).await.unwrap();
    complete_sync_job(&pool, job.id).await.unwrap();

    // Not due yet.
    set_next_execution(&pool, job.id, Some(Utc::now() + Duration::hours(1)))
        .await
        .unwrap();
    assert!(list_recurring_due_jobs(&pool).await.unwrap().is_empty());

    // Due now.
    set_next_execution(&pool, job.id, Some(Utc::now() - Duration::minutes(1)))
        .await
        .unwrap();
    let due = list_recurring_due_jobs(&pool).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, job.id);

    // Cleared after promotion.
    set_next_execution(&pool, job.id, None).await.unwrap();
    assert!(list_recurring_due_jobs(&pool).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Publications
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn due_publication_transitions_to_published(pool: sqlx::PgPool) {
    let publication = create_publication(&pool, &new_publication(1, 1)).await.unwrap();
    let not_due = create_publication(&pool, &new_publication(1, -60)).await.unwrap();

    let due = list_due_publications(&pool).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, publication.id);

    mark_publication_published(&pool, publication.id, "sp-9", "https://sp.example/sp-9")
        .await
        .unwrap();
    let row = get_publication(&pool, publication.id).await.unwrap();
    assert_eq!(row.status, "published");
    assert_eq!(row.platform_content_id.as_deref(), Some("sp-9"));
    assert!(row.published_at.is_some());

    // The already-published record cannot transition again.
    let result = mark_publication_failed(&pool, publication.id, "late failure").await;
    assert!(matches!(result, Err(DbError::InvalidPublicationTransition { .. })));

    let _ = not_due;
}

#[sqlx::test(migrations = "../../migrations")]
async fn failed_publication_keeps_error_and_is_not_retried(pool: sqlx::PgPool) {
    let publication = create_publication(&pool, &new_publication(1, 1)).await.unwrap();
    mark_publication_failed(&pool, publication.id, "upload rejected")
        .await
        .unwrap();

    let row = get_publication(&pool, publication.id).await.unwrap();
    assert_eq!(row.status, "failed");
    assert_eq!(row.last_error.as_deref(), Some("upload rejected"));

    // Failed records never show up as due again.
    assert!(list_due_publications(&pool).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Content items
// ---------------------------------------------------------------------------

fn content_item(metrics: EngagementSnapshot) -> podlink_db::NewContentItem {
    podlink_db::NewContentItem {
        user_id: 1,
        channel_id: "chan-1".to_string(),
        platform: "youtube".to_string(),
        external_id: "vid-1".to_string(),
        title: "Episode 12".to_string(),
        description: None,
        published_at: None,
        metrics,
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn content_upsert_seeds_then_appends_only_on_change(pool: sqlx::PgPool) {
    use podlink_db::{ContentUpsertOutcome, HistoryPoint};

    let snap = |views| EngagementSnapshot {
        views,
        likes: 0,
        comments: 0,
        shares: 0,
    };

    let outcome = upsert_content_item(&pool, &content_item(snap(100)), 100).await.unwrap();
    assert_eq!(outcome, ContentUpsertOutcome::Created);

    // Identical metrics: no history entry.
    let outcome = upsert_content_item(&pool, &content_item(snap(100)), 100).await.unwrap();
    assert_eq!(outcome, ContentUpsertOutcome::Unchanged);

    // Changed metrics: exactly one entry, holding the previous snapshot.
    let outcome = upsert_content_item(&pool, &content_item(snap(150)), 100).await.unwrap();
    assert_eq!(outcome, ContentUpsertOutcome::UpdatedWithHistory);

    let (views, history): (i64, serde_json::Value) = sqlx::query_as(
        "SELECT views, metrics_history FROM content_items WHERE user_id = 1 AND external_id = 'vid-1'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(views, 150);

    let history: Vec<HistoryPoint> = serde_json::from_value(history).unwrap();
    // Seed point plus the appended previous snapshot.
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].views, 100);
}

#[sqlx::test(migrations = "../../migrations")]
async fn content_history_evicts_oldest_past_cap(pool: sqlx::PgPool) {
    use podlink_db::HistoryPoint;

    let snap = |views| EngagementSnapshot {
        views,
        likes: 0,
        comments: 0,
        shares: 0,
    };

    upsert_content_item(&pool, &content_item(snap(0)), 3).await.unwrap();
    for views in 1..=5 {
        upsert_content_item(&pool, &content_item(snap(views)), 3).await.unwrap();
    }

    let history: serde_json::Value = sqlx::query_scalar(
        "SELECT metrics_history FROM content_items WHERE user_id = 1 AND external_id = 'vid-1'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    let history: Vec<HistoryPoint> = serde_json::from_value(history).unwrap();

    assert_eq!(history.len(), 3, "history must be capped");
    // Oldest evicted; the tail holds the three most recent previous values.
    assert_eq!(history[0].views, 2);
    assert_eq!(history[2].views, 4);
}

#[sqlx::test(migrations = "../../migrations")]
async fn comments_upsert_by_item_and_external_id(pool: sqlx::PgPool) {
    use podlink_db::{get_content_item_id, upsert_comment, NewComment};

    upsert_content_item(&pool, &content_item(EngagementSnapshot::default()), 100)
        .await
        .unwrap();
    let item_id = get_content_item_id(&pool, 1, "vid-1").await.unwrap();

    let comment = NewComment {
        external_id: "c1".to_string(),
        author: Some("ana".to_string()),
        text: "great episode".to_string(),
        like_count: 4,
        parent_external_id: None,
        published_at: None,
    };
    upsert_comment(&pool, item_id, &comment).await.unwrap();

    let mut updated = comment.clone();
    updated.like_count = 9;
    upsert_comment(&pool, item_id, &updated).await.unwrap();

    let (count, likes): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), MAX(like_count) FROM content_comments WHERE content_item_id = $1",
    )
    .bind(item_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count, 1, "re-harvest must update, not duplicate");
    assert_eq!(likes, 9);
}
