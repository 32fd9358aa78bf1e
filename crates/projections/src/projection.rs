//! Core projection trait and position tracking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use event_store::{EventEnvelope, EventId};

use crate::Result;

/// How far into the global record log a projection has read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    pub events_processed: u64,
    /// The last record handled, if any.
    pub last_event_id: Option<EventId>,
    pub last_recorded_at: Option<DateTime<Utc>>,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self::default()
    }

    /// The position after handling `event`.
    pub fn advance(&self, event: &EventEnvelope) -> Self {
        Self {
            events_processed: self.events_processed + 1,
            last_event_id: Some(event.event_id),
            last_recorded_at: Some(event.timestamp),
        }
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.last_event_id {
            Some(id) => write!(f, "position({}, last={id})", self.events_processed),
            None => write!(f, "position({})", self.events_processed),
        }
    }
}

/// Folds records from the log into a read model.
///
/// `handle` sees every record in the store, saga or not, and must advance
/// its position for each one so catch-up can skip what it has already seen.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    async fn position(&self) -> ProjectionPosition;

    /// Drops all derived state and rewinds to the start of the log.
    async fn reset(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::AggregateId;
    use event_store::Version;

    fn record() -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(AggregateId::new())
            .aggregate_type("AccessoryCompositionSaga")
            .event_type("SagaStarted")
            .version(Version::first())
            .payload_raw(serde_json::json!({}))
            .build()
            .unwrap()
    }

    #[test]
    fn position_starts_at_zero() {
        let pos = ProjectionPosition::zero();
        assert_eq!(pos.events_processed, 0);
        assert!(pos.last_event_id.is_none());
        assert_eq!(pos.to_string(), "position(0)");
    }

    #[test]
    fn position_tracks_last_record() {
        let first = record();
        let second = record();

        let pos = ProjectionPosition::zero().advance(&first).advance(&second);
        assert_eq!(pos.events_processed, 2);
        assert_eq!(pos.last_event_id, Some(second.event_id));
        assert_eq!(pos.last_recorded_at, Some(second.timestamp));
        assert!(pos.to_string().starts_with("position(2, last="));
    }
}
