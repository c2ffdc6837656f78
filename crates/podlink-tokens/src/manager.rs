//! Uniform credential operations over the store and the platform adapters.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use podlink_core::{AuthScheme, Platform};
use podlink_db::{CredentialRow, CredentialSecretsRow, NewCredential, ProfileColumns};
use podlink_platforms::{AdapterRegistry, RemoteProfile, TokenGrant};
use serde::Serialize;
use sqlx::PgPool;

use crate::crypto::TokenCipher;
use crate::TokenError;

/// Default token lifetime when the provider's grant omits `expires_in`.
const DEFAULT_LIFETIME_SECS: i64 = 3600;

/// Outcome of a connection check for one platform.
///
/// This is the caller-facing status enum — credential problems are values,
/// never errors thrown out of the schedulers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// No credential record exists.
    Missing,
    /// Token is valid (not expired, or the scheme never expires).
    Active,
    /// Token had expired; a refresh succeeded within this check.
    Refreshed,
    /// Refresh was attempted and rejected. The record is kept so the user
    /// can be prompted to reconnect.
    RefreshFailed { error: String },
    /// The check itself failed (storage or decryption), not the credential.
    CheckFailed { error: String },
}

impl ConnectionStatus {
    /// `true` when the platform can be called with the stored token.
    #[must_use]
    pub fn connected(&self) -> bool {
        matches!(self, ConnectionStatus::Active | ConnectionStatus::Refreshed)
    }
}

/// Computes the stored expiry for a fresh grant: `now + expires_in`
/// (defaulting to one hour), or `None` for schemes that never expire.
#[must_use]
pub fn compute_expiry(
    scheme: AuthScheme,
    expires_in: Option<i64>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if !scheme.expires() {
        return None;
    }
    Some(now + Duration::seconds(expires_in.unwrap_or(DEFAULT_LIFETIME_SECS)))
}

/// Platform-agnostic credential operations.
///
/// Exclusively owns credential mutation; everything else reads through it.
pub struct TokenManager {
    pool: PgPool,
    cipher: TokenCipher,
    adapters: Arc<AdapterRegistry>,
}

impl TokenManager {
    #[must_use]
    pub fn new(pool: PgPool, cipher: TokenCipher, adapters: Arc<AdapterRegistry>) -> Self {
        Self {
            pool,
            cipher,
            adapters,
        }
    }

    /// The stored credential for `(user, platform)` without secret material.
    ///
    /// Callers that need to call a platform adapter should use
    /// [`TokenManager::authorized_token`] instead, which verifies, refreshes
    /// if needed, and decrypts.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Db`] if the lookup fails.
    pub async fn get_credential(
        &self,
        platform: Platform,
        user_id: i64,
    ) -> Result<Option<CredentialRow>, TokenError> {
        Ok(podlink_db::get_credential(&self.pool, user_id, platform.as_str()).await?)
    }

    /// Verifies the credential and refreshes it when expired.
    ///
    /// Never calls the platform unless the recorded expiry has passed.
    /// A rejected refresh marks the credential `expired` (or `invalid` when
    /// the platform classified the rejection as permanent) but keeps the
    /// record for user-visible reconnect prompts.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Db`] only for storage failures; credential
    /// problems are reported through the returned [`ConnectionStatus`].
    pub async fn verify_and_refresh(
        &self,
        platform: Platform,
        user_id: i64,
    ) -> Result<ConnectionStatus, TokenError> {
        let (status, _token) = self.verify_with_token(platform, user_id).await?;
        Ok(status)
    }

    /// Verifies/refreshes and returns the decrypted access token when the
    /// credential is usable, `None` otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Db`] if storage fails.
    pub async fn authorized_token(
        &self,
        platform: Platform,
        user_id: i64,
    ) -> Result<Option<String>, TokenError> {
        let (_status, token) = self.verify_with_token(platform, user_id).await?;
        Ok(token)
    }

    async fn verify_with_token(
        &self,
        platform: Platform,
        user_id: i64,
    ) -> Result<(ConnectionStatus, Option<String>), TokenError> {
        let Some(row) =
            podlink_db::get_credential_with_secrets(&self.pool, user_id, platform.as_str()).await?
        else {
            return Ok((ConnectionStatus::Missing, None));
        };

        if row.status == "invalid" {
            return Ok((
                ConnectionStatus::RefreshFailed {
                    error: "credential marked invalid; reconnect required".to_owned(),
                },
                None,
            ));
        }

        let scheme = platform.auth_scheme();
        let expired = match row.expires_at {
            Some(expires_at) if scheme.expires() => expires_at <= Utc::now(),
            _ => false,
        };

        if !expired {
            let token = match self.cipher.decrypt(&row.access_token_enc) {
                Ok(token) => token,
                Err(e) => {
                    return Ok((
                        ConnectionStatus::CheckFailed {
                            error: e.to_string(),
                        },
                        None,
                    ))
                }
            };
            podlink_db::touch_credential_used(&self.pool, row.id).await?;
            return Ok((ConnectionStatus::Active, Some(token)));
        }

        self.attempt_refresh(platform, scheme, &row).await
    }

    async fn attempt_refresh(
        &self,
        platform: Platform,
        scheme: AuthScheme,
        row: &CredentialSecretsRow,
    ) -> Result<(ConnectionStatus, Option<String>), TokenError> {
        // Exchange-style schemes renew from the current access token;
        // refresh-style schemes need the stored refresh token.
        let material_enc = match scheme {
            AuthScheme::OauthExchange => Some(row.access_token_enc.clone()),
            AuthScheme::OauthRefresh => row.refresh_token_enc.clone(),
            AuthScheme::SignedRequest => None,
        };

        let Some(material_enc) = material_enc else {
            podlink_db::mark_credential_status(&self.pool, row.id, "expired").await?;
            return Ok((
                ConnectionStatus::RefreshFailed {
                    error: "token expired and no refresh material is stored".to_owned(),
                },
                None,
            ));
        };

        let material = match self.cipher.decrypt(&material_enc) {
            Ok(material) => material,
            Err(e) => {
                return Ok((
                    ConnectionStatus::CheckFailed {
                        error: e.to_string(),
                    },
                    None,
                ))
            }
        };

        let adapter = match self.adapters.get(platform) {
            Ok(adapter) => adapter,
            Err(e) => {
                return Ok((
                    ConnectionStatus::RefreshFailed {
                        error: e.to_string(),
                    },
                    None,
                ))
            }
        };

        match adapter.refresh(&material).await {
            Ok(grant) => {
                let access_token_enc = self.cipher.encrypt(&grant.access_token)?;
                let refresh_token_enc = grant
                    .refresh_token
                    .as_deref()
                    .map(|t| self.cipher.encrypt(t))
                    .transpose()?;
                let expires_at = compute_expiry(scheme, grant.expires_in, Utc::now());
                podlink_db::update_credential_after_refresh(
                    &self.pool,
                    row.id,
                    &access_token_enc,
                    refresh_token_enc.as_deref(),
                    expires_at,
                )
                .await?;
                tracing::info!(platform = %platform, user_id = row.user_id, "token refreshed");
                Ok((ConnectionStatus::Refreshed, Some(grant.access_token)))
            }
            Err(e) => {
                // Ambiguous refresh failures stay retryable (`expired`);
                // only an explicit auth rejection is permanent.
                let new_status = if e.is_auth_rejection() {
                    "invalid"
                } else {
                    "expired"
                };
                podlink_db::mark_credential_status(&self.pool, row.id, new_status).await?;
                tracing::warn!(
                    platform = %platform,
                    user_id = row.user_id,
                    status = new_status,
                    error = %e,
                    "token refresh rejected"
                );
                Ok((
                    ConnectionStatus::RefreshFailed {
                        error: e.to_string(),
                    },
                    None,
                ))
            }
        }
    }

    /// Completes an OAuth connect: exchanges the authorization code, fetches
    /// the remote profile (best effort), and upserts the credential.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Adapter`] if the code exchange is rejected,
    /// [`TokenError::Crypto`] if encryption fails, or [`TokenError::Db`] if
    /// the upsert fails. A failed profile fetch is logged, not fatal — the
    /// profile columns stay empty until the next successful fetch.
    pub async fn connect_with_code(
        &self,
        platform: Platform,
        user_id: i64,
        code: &str,
        redirect_uri: &str,
    ) -> Result<CredentialRow, TokenError> {
        let adapter = self.adapters.get(platform)?;
        let grant = adapter.exchange_code(code, redirect_uri).await?;

        let profile = match adapter.fetch_profile(&grant.access_token).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!(platform = %platform, user_id, error = %e, "profile fetch after exchange failed");
                None
            }
        };

        self.save_credential(platform, user_id, &grant, profile.as_ref())
            .await
    }

    /// Upserts the credential after a successful OAuth exchange.
    ///
    /// Re-running with fresh token data updates the existing `(user,
    /// platform)` record in place — never a duplicate.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Crypto`] if encryption fails or
    /// [`TokenError::Db`] if the upsert fails.
    pub async fn save_credential(
        &self,
        platform: Platform,
        user_id: i64,
        grant: &TokenGrant,
        profile: Option<&RemoteProfile>,
    ) -> Result<CredentialRow, TokenError> {
        let tokens = NewCredential {
            access_token_enc: self.cipher.encrypt(&grant.access_token)?,
            refresh_token_enc: grant
                .refresh_token
                .as_deref()
                .map(|t| self.cipher.encrypt(t))
                .transpose()?,
            expires_at: compute_expiry(platform.auth_scheme(), grant.expires_in, Utc::now()),
            scope: grant.scope.clone(),
        };

        let profile_cols = profile.map_or_else(ProfileColumns::default, |p| ProfileColumns {
            profile_id: Some(p.id.clone()),
            profile_handle: p.handle.clone(),
            profile_name: p.display_name.clone(),
        });

        let row = podlink_db::upsert_credential(
            &self.pool,
            user_id,
            platform.as_str(),
            &tokens,
            &profile_cols,
        )
        .await?;
        tracing::info!(platform = %platform, user_id, "credential saved");
        Ok(row)
    }

    /// Revokes remotely (best effort) and deletes the local record.
    ///
    /// Remote failure — including platforms without a revocation endpoint —
    /// is logged and never blocks local deletion.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Db`] only if the local delete fails.
    pub async fn revoke_credential(
        &self,
        platform: Platform,
        user_id: i64,
    ) -> Result<bool, TokenError> {
        let row =
            podlink_db::get_credential_with_secrets(&self.pool, user_id, platform.as_str()).await?;

        if let Some(row) = &row {
            match self.cipher.decrypt(&row.access_token_enc) {
                Ok(access_token) => {
                    if let Ok(adapter) = self.adapters.get(platform) {
                        if let Err(e) = adapter.revoke(&access_token).await {
                            tracing::warn!(
                                platform = %platform,
                                user_id,
                                error = %e,
                                "remote revoke failed; deleting local record anyway"
                            );
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        platform = %platform,
                        user_id,
                        error = %e,
                        "could not decrypt token for remote revoke"
                    );
                }
            }
        }

        let deleted = podlink_db::delete_credential(&self.pool, user_id, platform.as_str()).await?;
        if deleted {
            tracing::info!(platform = %platform, user_id, "credential deleted");
        }
        Ok(deleted)
    }

    /// Connection status for every platform, checked concurrently.
    ///
    /// One platform's failure never hides the others: per-platform errors
    /// are folded into [`ConnectionStatus::CheckFailed`].
    pub async fn check_all_connections(
        &self,
        user_id: i64,
    ) -> BTreeMap<Platform, ConnectionStatus> {
        let checks = Platform::ALL.map(|platform| async move {
            let status = match self.verify_and_refresh(platform, user_id).await {
                Ok(status) => status,
                Err(e) => ConnectionStatus::CheckFailed {
                    error: e.to_string(),
                },
            };
            (platform, status)
        });

        futures::future::join_all(checks).await.into_iter().collect()
    }
}
