//! Domain error types.

use thiserror::Error;

/// Errors raised while rebuilding a value from its records.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Stream {aggregate_id} holds {found} records, expected {expected}")]
    WrongAggregateType {
        aggregate_id: String,
        expected: &'static str,
        found: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
