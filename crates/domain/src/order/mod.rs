//! The order aggregate: the saga's state machine.

mod aggregate;
mod events;
mod request;
mod state;

pub use aggregate::{FailureRecord, Order};
pub use events::{
    CustomerVerifiedData, DriverAssignedData, OrderAttributes, OrderCancelledData,
    OrderCompletedData, OrderEvent, OrderFailedData, OrderPublishedData, OrderRejectedData,
    OrderRequestedData, PizzaVerifiedData,
};
pub use request::{OrderRequest, PlaceOrderResult};
pub use state::OrderState;

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The order already received a driver.
    #[error("Order already has a driver assigned")]
    AlreadyAssigned,

    /// Order is not in the expected state.
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: OrderState,
        action: &'static str,
    },

    /// The order stream already has its request.
    #[error("Order already requested")]
    AlreadyRequested,

    /// Customer verification was attempted with the unknown sentinel.
    #[error("Customer is not known")]
    UnknownCustomer,

    /// A step needed data an earlier step should have recorded.
    #[error("Order is missing its {0}")]
    MissingDetails(&'static str),
}
