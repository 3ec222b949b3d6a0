//! Read model views for the dashboard.

pub mod order_index;

pub use order_index::{IndexCount, OrderFilter, OrderIndex, OrderIndexEntry};
