//! Saga error types.

use common::OrderId;
use domain::{DomainError, OrderState};
use journal::JournalError;
use projections::ProjectionError;
use thiserror::Error;

use crate::retry::CallFailure;

/// Errors that can occur while driving or resolving an order saga.
#[derive(Debug, Error)]
pub enum SagaError {
    /// A remote step gave up; the order is now Failed.
    #[error("Order {order_id} failed at step '{step}' after {attempts} attempt(s): {reason}")]
    OperationalFailure {
        order_id: OrderId,
        step: String,
        attempts: u32,
        reason: String,
    },

    /// No order with this ID has been submitted.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order already received a driver.
    #[error("Order {0} already has a driver assigned")]
    AlreadyAssigned(OrderId),

    /// The order is not in a state that allows the action.
    #[error("Cannot {action} order {order_id} in {state} state")]
    InvalidState {
        order_id: OrderId,
        state: OrderState,
        action: &'static str,
    },

    /// The order was cancelled before it finished.
    #[error("Order {0} was cancelled")]
    Cancelled(OrderId),

    /// A remote call outside any order failed.
    #[error("Remote call failed: {0}")]
    Remote(#[from] CallFailure),

    /// The saga task stopped without reporting an outcome.
    #[error("Saga task aborted: {0}")]
    Aborted(String),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
