//! Credential lifecycle management.
//!
//! [`TokenManager`] is the only component that mutates credentials: it owns
//! encryption of token material at rest, verify-and-refresh, upsert on OAuth
//! exchange, and best-effort revocation. All schedulers obtain platform
//! access tokens through it.

use thiserror::Error;

pub mod crypto;
pub mod manager;

pub use crypto::{CryptoError, TokenCipher};
pub use manager::{ConnectionStatus, TokenManager};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Db(#[from] podlink_db::DbError),
    #[error(transparent)]
    Adapter(#[from] podlink_platforms::AdapterError),
}
