//! Shared types used across the composition workspace.

pub mod types;

pub use types::AggregateId;
