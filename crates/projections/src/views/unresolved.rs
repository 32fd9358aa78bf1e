//! Sagas that ended with their forward swap still applied.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{BalanceSet, ItemId, TokenMetadata};
use event_store::EventEnvelope;
use saga::SagaEvent;
use tokio::sync::RwLock;

use super::decode_saga_event;
use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// One entry of the remediation queue.
///
/// `lock_set` and `unlock_set` are the forward sets. An operator undoing the
/// swap by hand applies them with roles exchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedOperation {
    pub saga_id: AggregateId,
    pub item_id: ItemId,
    pub lock_set: BalanceSet,
    pub unlock_set: BalanceSet,
    /// The metadata that was never stored.
    pub metadata: TokenMetadata,
    pub error: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Default)]
struct UnresolvedState {
    operations: Vec<UnresolvedOperation>,
    position: ProjectionPosition,
}

/// Every `OperationFailedInconsistent` record, oldest first.
#[derive(Clone, Default)]
pub struct UnresolvedOperationsView {
    state: Arc<RwLock<UnresolvedState>>,
}

impl UnresolvedOperationsView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, saga_id: AggregateId) -> Option<UnresolvedOperation> {
        self.state
            .read()
            .await
            .operations
            .iter()
            .find(|op| op.saga_id == saga_id)
            .cloned()
    }

    pub async fn all(&self) -> Vec<UnresolvedOperation> {
        self.state.read().await.operations.clone()
    }

    pub async fn for_item(&self, item_id: &ItemId) -> Vec<UnresolvedOperation> {
        self.state
            .read()
            .await
            .operations
            .iter()
            .filter(|op| &op.item_id == item_id)
            .cloned()
            .collect()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.operations.is_empty()
    }
}

#[async_trait]
impl Projection for UnresolvedOperationsView {
    fn name(&self) -> &'static str {
        "UnresolvedOperationsView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let unresolved = match decode_saga_event(event)? {
            Some(SagaEvent::OperationFailedInconsistent(data)) => Some(UnresolvedOperation {
                saga_id: event.aggregate_id,
                item_id: data.item_id,
                lock_set: data.lock_set,
                unlock_set: data.unlock_set,
                metadata: data.metadata,
                error: data.error,
                recorded_at: event.timestamp,
            }),
            _ => None,
        };

        let mut state = self.state.write().await;
        if let Some(op) = unresolved {
            tracing::warn!(saga_id = %op.saga_id, item_id = %op.item_id, "unresolved operation queued");
            state.operations.push(op);
        }
        state.position = state.position.advance(event);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = UnresolvedState::default();
        Ok(())
    }
}

impl ReadModel for UnresolvedOperationsView {
    fn name(&self) -> &'static str {
        "UnresolvedOperationsView"
    }

    fn count(&self) -> usize {
        self.state
            .try_read()
            .map(|s| s.operations.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{AccountId, ComposeRequest, SagaRequest};
    use event_store::Version;
    use saga::Gas;

    fn request(item: &str) -> SagaRequest {
        ComposeRequest {
            item_id: item.to_string(),
            item_owner: "alice.near".to_string(),
            lock_token_ids: vec!["1".to_string()],
            lock_amounts: vec!["10".into()],
            unlock_token_ids: vec![],
            unlock_amounts: vec![],
            metadata: TokenMetadata::titled("v2"),
        }
        .validate()
        .unwrap()
    }

    fn envelope(saga_id: AggregateId, version: i64, event: &SagaEvent) -> EventEnvelope {
        use domain::DomainEvent;

        EventEnvelope::builder()
            .aggregate_id(saga_id)
            .aggregate_type("AccessoryCompositionSaga")
            .event_type(event.event_type())
            .version(Version::new(version))
            .payload(event)
            .unwrap()
            .build()
            .unwrap()
    }

    fn started(saga_id: AggregateId, item: &str) -> SagaEvent {
        SagaEvent::saga_started(
            saga_id,
            AccountId::parse("owner.near").unwrap(),
            &request(item),
            Gas::from_tgas(90),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn only_inconsistent_terminals_are_queued() {
        let view = UnresolvedOperationsView::new();
        let clean = AggregateId::new();
        let stuck = AggregateId::new();

        let records = [
            envelope(clean, 1, &started(clean, "77")),
            envelope(
                clean,
                2,
                &SagaEvent::operation_failed_clean(&ItemId::parse("77").unwrap(), "rolled back"),
            ),
            envelope(stuck, 1, &started(stuck, "77")),
            envelope(
                stuck,
                2,
                &SagaEvent::operation_failed_inconsistent(&request("77"), "Ledger unavailable"),
            ),
        ];
        for record in &records {
            view.handle(record).await.unwrap();
        }

        assert_eq!(ReadModel::count(&view), 1);
        assert!(view.get(clean).await.is_none());

        let op = view.get(stuck).await.unwrap();
        assert_eq!(op.item_id.as_str(), "77");
        assert_eq!(op.lock_set, request("77").lock_set);
        assert_eq!(op.metadata, TokenMetadata::titled("v2"));
        assert_eq!(op.error, "Ledger unavailable");
        assert_eq!(op.recorded_at, records[3].timestamp);
        assert_eq!(view.position().await.events_processed, 4);
    }

    #[tokio::test]
    async fn filters_by_item_and_ignores_foreign_streams() {
        let view = UnresolvedOperationsView::new();
        for item in ["77", "78", "77"] {
            let saga_id = AggregateId::new();
            view.handle(&envelope(
                saga_id,
                2,
                &SagaEvent::operation_failed_inconsistent(&request(item), "outage"),
            ))
            .await
            .unwrap();
        }

        let foreign = EventEnvelope::builder()
            .aggregate_id(AggregateId::new())
            .aggregate_type("Other")
            .event_type("OperationFailedInconsistent")
            .version(Version::first())
            .payload_raw(serde_json::json!({"not": "a saga record"}))
            .build()
            .unwrap();
        view.handle(&foreign).await.unwrap();

        assert_eq!(view.all().await.len(), 3);
        assert_eq!(
            view.for_item(&ItemId::parse("77").unwrap()).await.len(),
            2
        );
        assert_eq!(view.position().await.events_processed, 4);
    }

    #[tokio::test]
    async fn reset_clears_queue() {
        let view = UnresolvedOperationsView::new();
        view.handle(&envelope(
            AggregateId::new(),
            2,
            &SagaEvent::operation_failed_inconsistent(&request("77"), "outage"),
        ))
        .await
        .unwrap();

        view.reset().await.unwrap();
        assert!(view.is_empty().await);
        assert_eq!(view.position().await, ProjectionPosition::zero());
    }
}
