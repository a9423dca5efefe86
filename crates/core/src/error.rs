//! The two error kinds the core can produce.
//!
//! Everything else is absorbed by the normalizer's field-resolution
//! fallbacks: missing or misnamed fields default, they never fail.

use thiserror::Error;

/// The raw input could not be decoded as a structured document at all.
///
/// Recoverable: surfaced to the end user verbatim so they can fix the
/// pasted content.
#[derive(Debug, Error)]
#[error("invalid JSON: {0}")]
pub struct ParseError(#[from] serde_json::Error);

/// The document failed the minimal shape check that gates normalization.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct ValidationError {
    reason: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Human-readable reason, suitable for re-prompting the user.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}
