//! Append-only event store boundary.
//!
//! Streams are scoped to a society; the store makes no storage assumptions
//! beyond append + ordered load.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
