use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateId, EventEnvelope, EventQuery, EventStoreError, Result, Version};

/// Options for appending records to a stream.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Version the stream must be at before the append. `None` skips the check.
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Expects the stream to be empty.
    pub fn expect_new() -> Self {
        Self::expect_version(Version::initial())
    }
}

/// A stream of records.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

/// Append-only storage for saga records.
///
/// Implementations must be thread-safe; records are never updated or removed.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a batch to one stream atomically and returns the new stream version.
    ///
    /// Fails with `ConcurrencyConflict` when `options.expected_version` is set
    /// and does not match.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version>;

    /// Returns every record of a stream in version order.
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    /// Records matching `query`, in insertion order, after offset and limit.
    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>>;

    /// Streams every record in insertion order.
    async fn stream_all_events(&self) -> Result<EventStream>;
}

/// Checks that a batch targets a single stream with consecutive versions.
pub fn validate_events_for_append(events: &[EventEnvelope]) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "cannot append an empty batch".to_string(),
        ));
    };

    let mut expected_version = first.version;
    for event in events.iter().skip(1) {
        if event.aggregate_id != first.aggregate_id || event.aggregate_type != first.aggregate_type
        {
            return Err(EventStoreError::InvalidAppend(
                "all records in a batch must target the same stream".to_string(),
            ));
        }
        expected_version = expected_version.next();
        if event.version != expected_version {
            return Err(EventStoreError::InvalidAppend(format!(
                "record versions must be consecutive: expected {}, got {}",
                expected_version, event.version
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(stream: AggregateId, version: i64) -> EventEnvelope {
        EventEnvelope::builder()
            .event_type("StepCompleted")
            .aggregate_id(stream)
            .aggregate_type("AccessoryCompositionSaga")
            .version(Version::new(version))
            .payload_raw(serde_json::json!({}))
            .build()
            .unwrap()
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert!(matches!(
            validate_events_for_append(&[]),
            Err(EventStoreError::InvalidAppend(_))
        ));
    }

    #[test]
    fn mixed_streams_are_rejected() {
        let batch = [record(AggregateId::new(), 1), record(AggregateId::new(), 2)];
        assert!(validate_events_for_append(&batch).is_err());
    }

    #[test]
    fn gaps_in_versions_are_rejected() {
        let stream = AggregateId::new();
        let batch = [record(stream, 1), record(stream, 3)];
        assert!(validate_events_for_append(&batch).is_err());
    }

    #[test]
    fn consecutive_batch_is_accepted() {
        let stream = AggregateId::new();
        let batch = [record(stream, 4), record(stream, 5), record(stream, 6)];
        assert!(validate_events_for_append(&batch).is_ok());
    }
}
