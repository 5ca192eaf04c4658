//! Unified error handling for linkstash.
//!
//! Storage errors live in [`crate::db::DbError`]; this module holds the
//! errors raised while applying a mutation on behalf of an identity.

use crate::db::DbError;
use thiserror::Error;

// ============================================================================
// Engine Errors (mutation processing)
// ============================================================================

/// Errors that can occur while applying a mutation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The referenced row does not exist for this identity. Rows owned by
    /// someone else are reported the same way.
    #[error("no such {0}")]
    NotFound(&'static str),

    #[error("selection is empty")]
    EmptySelection,

    #[error("storage error: {0}")]
    Db(#[from] DbError),
}

impl EngineError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::EmptySelection => "empty_selection",
            Self::Db(_) => "storage_error",
        }
    }

    /// Expected outcomes that only deserve an informational log line.
    pub fn is_absence(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::EmptySelection)
    }
}

/// Result type for mutation engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
