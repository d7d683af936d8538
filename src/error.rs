use crate::blockchain::quota::QuotaExceeded;
use crate::checkpoint::CheckpointError;
use crate::validation::ValidationError;
use thiserror::Error;

/// Errors that stop a harvest run. Everything else (rate limits, transient
/// API failures, unresolved windows, per-record write failures) is absorbed
/// and logged where it happens.
#[derive(Error, Debug)]
pub enum HarvestError {
    #[error(transparent)]
    QuotaExceeded(#[from] QuotaExceeded),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid job specification: {0}")]
    Validation(#[from] ValidationError),
}
