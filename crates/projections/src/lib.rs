//! Read side of the pizza order saga.
//!
//! - [`OrderIndex`]: published orders the dashboard lists, counts and assigns
//! - [`LiveCountFeed`]: turns periodic count polling into a push stream
//! - [`Projection`] and [`ProjectionProcessor`]: rebuild read models from the journal

pub mod error;
pub mod feed;
pub mod processor;
pub mod projection;
pub mod views;

pub use error::{ProjectionError, Result};
pub use feed::{ChangeTracker, CountSource, CountSubscription, LiveCountFeed};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use views::{IndexCount, OrderFilter, OrderIndex, OrderIndexEntry};
