use thiserror::Error;

use crate::{AggregateId, Version};

/// Errors raised by the record log.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The stream was not at the version the writer expected.
    #[error(
        "Concurrency conflict for stream {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// The batch handed to `append` was malformed.
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    /// An envelope was built without one of its required fields.
    #[error("Envelope is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for record log operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
