//! Remote service traits and in-memory simulators for the saga's lookups.

pub mod directory;
pub mod faults;
pub mod menu;

pub use directory::{CustomerDirectory, InMemoryCustomerDirectory};
pub use faults::{FaultInjector, FaultMode};
pub use menu::{InMemoryMenuService, MenuService};
