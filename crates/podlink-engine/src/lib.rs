//! The three background workers: sync dispatch + execution, publication
//! dispatch, and metrics collection.
//!
//! Each worker exposes a `run_*_tick` function that the server's scheduler
//! calls on its period. Ticks log and continue on per-item failure and never
//! panic the process; the only state they share is the database and the
//! [`registry::RunningJobs`] set owned by the sync dispatcher.

use std::sync::Arc;

use podlink_core::AppConfig;
use podlink_platforms::AdapterRegistry;
use podlink_tokens::TokenManager;
use sqlx::PgPool;
use thiserror::Error;

pub mod metrics;
pub mod publish;
pub mod registry;
pub mod sync;

pub use registry::RunningJobs;

/// Shared handles every worker needs.
#[derive(Clone)]
pub struct EngineContext {
    pub pool: PgPool,
    pub tokens: Arc<TokenManager>,
    pub adapters: Arc<AdapterRegistry>,
    pub config: Arc<AppConfig>,
}

/// Failures that abort a whole unit of work (one sync job, one dispatch).
///
/// Per-item failures inside a unit are counted and logged instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown platform '{0}'")]
    UnknownPlatform(String),
    #[error("platform {0} is not connected for this user")]
    NotConnected(&'static str),
    #[error(transparent)]
    Adapter(#[from] podlink_platforms::AdapterError),
    #[error(transparent)]
    Token(#[from] podlink_tokens::TokenError),
    #[error(transparent)]
    Db(#[from] podlink_db::DbError),
}
