//! Database operations for the `publications` table.
//!
//! Status transitions after authoring (`scheduled → published | failed`) are
//! owned by the publication dispatcher; both are conditional updates so a
//! record already moved by a racing tick is left alone.

use chrono::{DateTime, Utc};
use podlink_core::EngagementSnapshot;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `publications` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PublicationRow {
    pub id: i64,
    pub public_id: Uuid,
    pub user_id: i64,
    pub platform: String,
    pub title: String,
    pub description: Option<String>,
    /// Opaque reference to the uploaded media (storage key or URL).
    pub media_ref: Option<String>,
    pub scheduled_for: DateTime<Utc>,
    /// One of `scheduled`, `published`, `failed`.
    pub status: String,
    pub platform_content_id: Option<String>,
    pub platform_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub metrics_updated_at: Option<DateTime<Utc>>,
    /// `true` when the stored counters are a synthetic estimate rather than
    /// a measured fetch.
    pub metrics_estimated: bool,
    pub created_at: DateTime<Utc>,
}

impl PublicationRow {
    /// Current counters as a comparable snapshot.
    #[must_use]
    pub fn metrics(&self) -> EngagementSnapshot {
        EngagementSnapshot {
            views: self.views,
            likes: self.likes,
            comments: self.comments,
            shares: self.shares,
        }
    }
}

/// Fields for creating a publication (the authoring flow's write).
#[derive(Debug, Clone)]
pub struct NewPublication {
    pub user_id: i64,
    pub platform: String,
    pub title: String,
    pub description: Option<String>,
    pub media_ref: Option<String>,
    pub scheduled_for: DateTime<Utc>,
}

const SELECT_COLUMNS: &str = "id, public_id, user_id, platform, title, description, media_ref, \
     scheduled_for, status, platform_content_id, platform_url, published_at, last_error, \
     views, likes, comments, shares, metrics_updated_at, metrics_estimated, created_at";

/// Creates a publication in `scheduled` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_publication(
    pool: &PgPool,
    publication: &NewPublication,
) -> Result<PublicationRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, PublicationRow>(&format!(
        "INSERT INTO publications \
             (public_id, user_id, platform, title, description, media_ref, scheduled_for, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, 'scheduled') \
         RETURNING {SELECT_COLUMNS}"
    ))
    .bind(public_id)
    .bind(publication.user_id)
    .bind(&publication.platform)
    .bind(&publication.title)
    .bind(&publication.description)
    .bind(&publication.media_ref)
    .bind(publication.scheduled_for)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetches a single publication by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_publication(pool: &PgPool, id: i64) -> Result<PublicationRow, DbError> {
    let row = sqlx::query_as::<_, PublicationRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM publications WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// All publications due for dispatch: `scheduled` with `scheduled_for` at or
/// before now, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_due_publications(pool: &PgPool) -> Result<Vec<PublicationRow>, DbError> {
    let rows = sqlx::query_as::<_, PublicationRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM publications \
         WHERE status = 'scheduled' AND scheduled_for <= NOW() \
         ORDER BY scheduled_for ASC, id ASC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Marks a publication `published` with its platform-assigned id and URL.
///
/// # Errors
///
/// Returns [`DbError::InvalidPublicationTransition`] if the row was not
/// `scheduled`, or [`DbError::Sqlx`] if the update fails.
pub async fn mark_publication_published(
    pool: &PgPool,
    id: i64,
    platform_content_id: &str,
    platform_url: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE publications SET \
             status = 'published', platform_content_id = $1, platform_url = $2, \
             published_at = NOW(), last_error = NULL \
         WHERE id = $3 AND status = 'scheduled'",
    )
    .bind(platform_content_id)
    .bind(platform_url)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidPublicationTransition { id });
    }

    Ok(())
}

/// Marks a publication `failed` with the stored error text. No automatic
/// retry: a human or a higher-level policy re-schedules.
///
/// # Errors
///
/// Returns [`DbError::InvalidPublicationTransition`] if the row was not
/// `scheduled`, or [`DbError::Sqlx`] if the update fails.
pub async fn mark_publication_failed(pool: &PgPool, id: i64, error: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE publications SET status = 'failed', last_error = $1 \
         WHERE id = $2 AND status = 'scheduled'",
    )
    .bind(error)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidPublicationTransition { id });
    }

    Ok(())
}

/// All `published` publications, for the adaptive metrics pass.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_published_publications(pool: &PgPool) -> Result<Vec<PublicationRow>, DbError> {
    let rows = sqlx::query_as::<_, PublicationRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM publications \
         WHERE status = 'published' \
         ORDER BY user_id, platform, id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Writes refreshed engagement counters with their provenance flag and
/// stamps `metrics_updated_at`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_publication_metrics(
    pool: &PgPool,
    id: i64,
    metrics: &EngagementSnapshot,
    estimated: bool,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE publications SET \
             views = $1, likes = $2, comments = $3, shares = $4, \
             metrics_updated_at = NOW(), metrics_estimated = $5 \
         WHERE id = $6",
    )
    .bind(metrics.views)
    .bind(metrics.likes)
    .bind(metrics.comments)
    .bind(metrics.shares)
    .bind(estimated)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}
