//! Append-only record log.
//!
//! Saga runs write their progress and terminal outcome here as
//! [`EventEnvelope`]s grouped into per-run streams. The orchestrator never
//! reads the log to make decisions; it exists for operators, projections
//! and test harnesses.

pub mod error;
pub mod event;
pub mod memory;
pub mod query;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use query::EventQuery;
pub use store::{AppendOptions, EventStore, EventStream};
