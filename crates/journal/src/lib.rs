//! Persisted step journal for order sagas.
//!
//! Every saga transition is appended to the order's stream as a
//! [`JournalEntry`]. Replaying a stream rebuilds the saga exactly where it
//! left off, so completed steps are never executed twice.

pub mod entry;
pub mod error;
pub mod file;
pub mod memory;
pub mod store;

pub use common::OrderId;
pub use entry::{EntryId, JournalEntry, JournalEntryBuilder, Sequence};
pub use error::{JournalError, Result};
pub use file::FileJournal;
pub use memory::InMemoryJournal;
pub use store::{AppendOptions, EntryStream, Journal};
