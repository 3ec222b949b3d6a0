//! The place-order saga.
//!
//! An order moves through these steps, each journaled before the next:
//! 1. Look the pizza up on the menu
//! 2. Look the customer up in the directory
//! 3. Publish the order to the dashboard index
//! 4. Wait for a driver to be assigned
//!
//! An unknown pizza or customer rejects the order. A remote call that keeps
//! failing past its retry policy fails it.

pub mod coordinator;
pub mod error;
pub mod place_order;
pub mod retry;
pub mod services;
pub mod slots;

pub use coordinator::{SagaCoordinator, SagaHandle};
pub use error::{Result, SagaError};
pub use retry::{Attempted, CallFailure, ErrorKind, RemoteError, RetryPolicy, StepPolicies};
pub use services::{
    CustomerDirectory, FaultInjector, FaultMode, InMemoryCustomerDirectory, InMemoryMenuService,
    MenuService,
};
pub use slots::{OrderSlot, OrderSlots};
