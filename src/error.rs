//! Error types for the achievement API and its storage tiers.

use std::path::PathBuf;

use thiserror::Error;

use crate::context::WaitError;

/// Errors surfaced by [`crate::api::AchievementsApi`].
#[derive(Debug, Error)]
pub enum ApiError {
    /// A required argument was absent or empty. Raised before any tier is touched.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is only defined on the main loop thread.
    #[error("operation must run on the primary thread")]
    NotPrimaryContext,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Durable tier and cache load failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored row could not be mapped back to the domain model.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Bulk restore failures. `index` is the position of the offending record.
#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("record {index}: {reason}")]
    Record { index: usize, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("restore did not complete on the main loop: {0:?}")]
    Aborted(WaitError),
}

/// Errors raised while wiring up [`crate::service::AchievementService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to start main loop: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("main loop stopped during startup")]
    Startup,
}
