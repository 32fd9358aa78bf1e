//! Projection error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// A saga record payload did not decode.
    #[error("Record deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// A saga record lacked the envelope metadata a view relies on.
    #[error("Record {event_type} is missing metadata key {key}")]
    MissingMetadata {
        event_type: String,
        key: &'static str,
    },
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
