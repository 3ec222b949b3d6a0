//! Domain layer for the pizza order saga.
//!
//! This crate provides:
//! - Aggregate and DomainEvent traits for journaled entities
//! - CommandHandler for loading an aggregate and appending its new events
//! - Reference data: the Catalog, the customer Directory and the driver Roster
//! - The Order aggregate, which is the saga's state machine

pub mod aggregate;
pub mod catalog;
pub mod command;
pub mod customer;
pub mod driver;
pub mod error;
pub mod order;
pub mod reference;

pub use aggregate::{Aggregate, DomainEvent};
pub use catalog::{Catalog, CatalogError, MenuItem};
pub use command::{CommandHandler, CommandResult, replay};
pub use customer::{Customer, Directory};
pub use driver::{Driver, DriverAssignment, Roster};
pub use error::{DomainError, Result};
pub use order::{
    FailureRecord, Order, OrderAttributes, OrderError, OrderEvent, OrderRequest, OrderState,
    PlaceOrderResult,
};
pub use reference::ReferenceData;
