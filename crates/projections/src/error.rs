//! Projection error types.

use common::OrderId;
use thiserror::Error;

/// Errors that can occur on the read side.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// An error occurred in the journal.
    #[error("Journal error: {0}")]
    Journal(#[from] journal::JournalError),

    /// Failed to deserialize an entry payload.
    #[error("Entry deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The order is not in the index.
    #[error("Order {0} is not in the index")]
    OrderNotFound(OrderId),

    /// The indexed order already has a driver.
    #[error("Order {0} already has a driver assigned")]
    AlreadyAssigned(OrderId),

    /// A projection-specific error.
    #[error("Projection error: {0}")]
    Projection(String),
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
