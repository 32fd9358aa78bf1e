//! Per-item history of composition sagas.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{AccountId, ItemId};
use event_store::EventEnvelope;
use saga::{SagaEvent, SagaState, composition::ITEM_ID_KEY};
use tokio::sync::RwLock;

use super::decode_saga_event;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;
use crate::{ProjectionError, Result};

/// How one saga against an item ended.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemOutcome {
    pub saga_id: AggregateId,
    /// One of the three terminal states.
    pub outcome: SagaState,
    pub caller: Option<AccountId>,
    /// Failure reason or rollback error, if the saga failed.
    pub detail: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemHistory {
    pub item_id: ItemId,
    pub sagas_started: usize,
    /// Terminal outcomes in the order they were recorded.
    pub outcomes: Vec<ItemOutcome>,
    pub last_activity: DateTime<Utc>,
}

impl ItemHistory {
    fn new(item_id: ItemId, at: DateTime<Utc>) -> Self {
        Self {
            item_id,
            sagas_started: 0,
            outcomes: Vec::new(),
            last_activity: at,
        }
    }

    /// Sagas started against the item that have not reached a terminal record.
    pub fn in_flight(&self) -> usize {
        self.sagas_started.saturating_sub(self.outcomes.len())
    }

    pub fn count(&self, outcome: SagaState) -> usize {
        self.outcomes.iter().filter(|o| o.outcome == outcome).count()
    }
}

#[derive(Default)]
struct ItemHistoryState {
    items: HashMap<ItemId, ItemHistory>,
    /// Starting oracle per saga, kept until the saga's terminal record.
    callers: HashMap<AggregateId, AccountId>,
    position: ProjectionPosition,
}

/// Groups saga records by the item they target.
///
/// The item is read from the `item_id` envelope metadata every saga record
/// carries, so intermediate records also bump `last_activity`.
#[derive(Clone, Default)]
pub struct ItemHistoryView {
    state: Arc<RwLock<ItemHistoryState>>,
}

impl ItemHistoryView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_item(&self, item_id: &ItemId) -> Option<ItemHistory> {
        self.state.read().await.items.get(item_id).cloned()
    }

    /// Items with at least one saga still running.
    pub async fn items_in_flight(&self) -> Vec<ItemHistory> {
        self.state
            .read()
            .await
            .items
            .values()
            .filter(|h| h.in_flight() > 0)
            .cloned()
            .collect()
    }
}

fn item_of(event: &EventEnvelope) -> Result<ItemId> {
    let missing = || ProjectionError::MissingMetadata {
        event_type: event.event_type.clone(),
        key: ITEM_ID_KEY,
    };
    let raw = event.metadata_str(ITEM_ID_KEY).ok_or_else(missing)?;
    ItemId::parse(raw).map_err(|_| missing())
}

#[async_trait]
impl Projection for ItemHistoryView {
    fn name(&self) -> &'static str {
        "ItemHistoryView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let Some(saga_event) = decode_saga_event(event)? else {
            let mut state = self.state.write().await;
            state.position = state.position.advance(event);
            return Ok(());
        };

        let item_id = item_of(event)?;
        let saga_id = event.aggregate_id;
        let mut state = self.state.write().await;

        let terminal = match saga_event {
            SagaEvent::SagaStarted(data) => {
                state.callers.insert(saga_id, data.caller);
                None
            }
            SagaEvent::OperationSucceeded(_) => Some((SagaState::Completed, None)),
            SagaEvent::OperationFailedClean(data) => {
                Some((SagaState::FailedClean, Some(data.reason)))
            }
            SagaEvent::OperationFailedInconsistent(data) => {
                Some((SagaState::FailedInconsistent, Some(data.error)))
            }
            _ => None,
        };
        let caller = match terminal {
            Some(_) => state.callers.remove(&saga_id),
            None => None,
        };

        let history = state
            .items
            .entry(item_id.clone())
            .or_insert_with(|| ItemHistory::new(item_id, event.timestamp));
        history.last_activity = event.timestamp;
        if event.event_type == "SagaStarted" {
            history.sagas_started += 1;
        }
        if let Some((outcome, detail)) = terminal {
            history.outcomes.push(ItemOutcome {
                saga_id,
                outcome,
                caller,
                detail,
                recorded_at: event.timestamp,
            });
        }

        state.position = state.position.advance(event);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = ItemHistoryState::default();
        Ok(())
    }
}

impl ReadModel for ItemHistoryView {
    fn name(&self) -> &'static str {
        "ItemHistoryView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.items.len()).unwrap_or(0)
    }
}
