//! Append-only event store boundary.
//!
//! Container-scoped event streams behind a trait, with an in-memory implementation for
//! tests and single-process deployments.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
