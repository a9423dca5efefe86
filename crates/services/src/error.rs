//! Shared error types for the services crate.

use thiserror::Error;

use plan_core::error::{ParseError, ValidationError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `PlanService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlanServiceError {
    /// The uploaded text is not a structured document at all. Recoverable:
    /// surfaced to the user verbatim.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The document failed the minimal shape check. Recoverable: the reason
    /// tells the user what to fix.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `Authenticator`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error("invalid authentication token")]
    InvalidToken,

    #[error("session expired")]
    Expired,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping planner services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlannerServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
