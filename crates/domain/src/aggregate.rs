//! Replay traits shared by every record-sourced type.

use common::AggregateId;
use event_store::{EventEnvelope, Version};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::DomainError;

/// A record that can be written to the log.
///
/// Records are facts: past tense, immutable, replayable.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Name stored in `EventEnvelope::event_type`.
    fn event_type(&self) -> &'static str;
}

/// A value rebuilt by folding its record stream.
///
/// `apply` must be deterministic and infallible: a record in the log has
/// already happened, so replay cannot reject it.
pub trait Aggregate: Default + Send + Sync + Sized {
    type Event: DomainEvent;

    /// Stream type name used when appending records.
    fn aggregate_type() -> &'static str;

    /// Stream key, or `None` before the first record is applied.
    fn id(&self) -> Option<AggregateId>;

    /// Number of records applied so far.
    fn version(&self) -> Version;

    fn set_version(&mut self, version: Version);

    fn apply(&mut self, event: Self::Event);

    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}

/// Rebuilds an aggregate from its stored records, or `None` for an empty
/// stream.
pub fn replay<A>(envelopes: Vec<EventEnvelope>) -> Result<Option<A>, DomainError>
where
    A: Aggregate,
{
    if envelopes.is_empty() {
        return Ok(None);
    }

    let mut aggregate = A::default();
    for envelope in envelopes {
        if envelope.aggregate_type != A::aggregate_type() {
            return Err(DomainError::WrongAggregateType {
                aggregate_id: envelope.aggregate_id.to_string(),
                expected: A::aggregate_type(),
                found: envelope.aggregate_type,
            });
        }
        let event: A::Event = serde_json::from_value(envelope.payload)?;
        aggregate.apply(event);
        aggregate.set_version(envelope.version);
    }
    Ok(Some(aggregate))
}
