//! Database operations for the `credentials` table.
//!
//! Token material is stored encrypted; this module never sees plaintext.
//! The two projections ([`CredentialRow`] without secrets,
//! [`CredentialSecretsRow`] with them) mirror the caller-facing
//! `include_secrets` switch — most readers never pull the encrypted columns
//! off the wire at all.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A `credentials` row without the encrypted token columns.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CredentialRow {
    pub id: i64,
    pub user_id: i64,
    pub platform: String,
    /// `NULL` for auth schemes that never expire.
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
    /// One of `pending`, `active`, `expired`, `invalid`.
    pub status: String,
    pub last_used_at: Option<DateTime<Utc>>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub profile_id: Option<String>,
    pub profile_handle: Option<String>,
    pub profile_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A full `credentials` row including the encrypted token columns.
///
/// `access_token_enc` and `refresh_token_enc` hold base64-packed
/// nonce-prefixed AES-GCM ciphertext; decryption happens in the token
/// manager, never here.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CredentialSecretsRow {
    pub id: i64,
    pub user_id: i64,
    pub platform: String,
    pub access_token_enc: String,
    pub refresh_token_enc: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
    pub status: String,
    pub profile_id: Option<String>,
}

/// Token fields for a credential create-or-replace.
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub access_token_enc: String,
    pub refresh_token_enc: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
}

/// Denormalized public profile fields, written alongside token material when
/// the OAuth exchange also fetched the remote profile.
#[derive(Debug, Clone, Default)]
pub struct ProfileColumns {
    pub profile_id: Option<String>,
    pub profile_handle: Option<String>,
    pub profile_name: Option<String>,
}

const SELECT_COLUMNS: &str = "id, user_id, platform, expires_at, scope, status, \
     last_used_at, last_refreshed_at, profile_id, profile_handle, profile_name, \
     created_at, updated_at";

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Creates or replaces the credential for `(user_id, platform)`.
///
/// Conflicts update the token columns, expiry, scope, and status in place and
/// keep the existing profile columns unless new values are provided. Status is
/// reset to `active` — a fresh token from the provider supersedes any earlier
/// `expired`/`invalid` marking.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_credential(
    pool: &PgPool,
    user_id: i64,
    platform: &str,
    tokens: &NewCredential,
    profile: &ProfileColumns,
) -> Result<CredentialRow, DbError> {
    let row = sqlx::query_as::<_, CredentialRow>(&format!(
        "INSERT INTO credentials \
             (user_id, platform, access_token_enc, refresh_token_enc, expires_at, scope, \
              status, profile_id, profile_handle, profile_name) \
         VALUES ($1, $2, $3, $4, $5, $6, 'active', $7, $8, $9) \
         ON CONFLICT (user_id, platform) DO UPDATE SET \
             access_token_enc  = EXCLUDED.access_token_enc, \
             refresh_token_enc = COALESCE(EXCLUDED.refresh_token_enc, credentials.refresh_token_enc), \
             expires_at        = EXCLUDED.expires_at, \
             scope             = COALESCE(EXCLUDED.scope, credentials.scope), \
             status            = 'active', \
             profile_id        = COALESCE(EXCLUDED.profile_id, credentials.profile_id), \
             profile_handle    = COALESCE(EXCLUDED.profile_handle, credentials.profile_handle), \
             profile_name      = COALESCE(EXCLUDED.profile_name, credentials.profile_name), \
             updated_at        = NOW() \
         RETURNING {SELECT_COLUMNS}"
    ))
    .bind(user_id)
    .bind(platform)
    .bind(&tokens.access_token_enc)
    .bind(&tokens.refresh_token_enc)
    .bind(tokens.expires_at)
    .bind(&tokens.scope)
    .bind(&profile.profile_id)
    .bind(&profile.profile_handle)
    .bind(&profile.profile_name)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetches the credential for `(user_id, platform)` without secret columns.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_credential(
    pool: &PgPool,
    user_id: i64,
    platform: &str,
) -> Result<Option<CredentialRow>, DbError> {
    let row = sqlx::query_as::<_, CredentialRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM credentials WHERE user_id = $1 AND platform = $2"
    ))
    .bind(user_id)
    .bind(platform)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Fetches the credential for `(user_id, platform)` including encrypted
/// token columns.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_credential_with_secrets(
    pool: &PgPool,
    user_id: i64,
    platform: &str,
) -> Result<Option<CredentialSecretsRow>, DbError> {
    let row = sqlx::query_as::<_, CredentialSecretsRow>(
        "SELECT id, user_id, platform, access_token_enc, refresh_token_enc, \
                expires_at, scope, status, profile_id \
         FROM credentials WHERE user_id = $1 AND platform = $2",
    )
    .bind(user_id)
    .bind(platform)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Records a verified use: sets `last_used_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn touch_credential_used(pool: &PgPool, id: i64) -> Result<(), DbError> {
    sqlx::query("UPDATE credentials SET last_used_at = NOW(), updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Persists a successful token refresh: new token material, new expiry,
/// status back to `active`, `last_refreshed_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_credential_after_refresh(
    pool: &PgPool,
    id: i64,
    access_token_enc: &str,
    refresh_token_enc: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE credentials SET \
             access_token_enc  = $1, \
             refresh_token_enc = COALESCE($2, refresh_token_enc), \
             expires_at        = $3, \
             status            = 'active', \
             last_refreshed_at = NOW(), \
             updated_at        = NOW() \
         WHERE id = $4",
    )
    .bind(access_token_enc)
    .bind(refresh_token_enc)
    .bind(expires_at)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Sets the credential status (`expired` after a rejected refresh, `invalid`
/// after a permanent auth failure elsewhere).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_credential_status(pool: &PgPool, id: i64, status: &str) -> Result<(), DbError> {
    sqlx::query("UPDATE credentials SET status = $1, updated_at = NOW() WHERE id = $2")
        .bind(status)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Deletes the credential for `(user_id, platform)`.
///
/// Returns `true` if a row was removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_credential(
    pool: &PgPool,
    user_id: i64,
    platform: &str,
) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM credentials WHERE user_id = $1 AND platform = $2")
        .bind(user_id)
        .bind(platform)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Lists credentials on one platform in the given status, for the daily
/// channel-stats pass.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_platform_credentials(
    pool: &PgPool,
    platform: &str,
    status: &str,
) -> Result<Vec<CredentialRow>, DbError> {
    let rows = sqlx::query_as::<_, CredentialRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM credentials \
         WHERE platform = $1 AND status = $2 \
         ORDER BY user_id"
    ))
    .bind(platform)
    .bind(status)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
