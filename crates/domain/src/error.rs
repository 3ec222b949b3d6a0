//! Domain error types.

use journal::JournalError;
use thiserror::Error;

use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the journal.
    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    /// The order rejected a command.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// A journal entry could not be built from an event.
    #[error("Journal entry is missing required fields")]
    IncompleteEntry,

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
