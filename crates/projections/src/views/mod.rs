//! Views over saga records.

pub mod item_history;
pub mod unresolved;

pub use item_history::{ItemHistory, ItemHistoryView, ItemOutcome};
pub use unresolved::{UnresolvedOperation, UnresolvedOperationsView};

use event_store::EventEnvelope;
use saga::{SagaEvent, SagaRecord};

use crate::Result;

/// Decodes a saga record, or `None` for records from other streams.
pub(crate) fn decode_saga_event(event: &EventEnvelope) -> Result<Option<SagaEvent>> {
    use domain::Aggregate;

    if event.aggregate_type != SagaRecord::aggregate_type() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(event.payload.clone())?))
}
