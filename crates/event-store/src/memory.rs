use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventQuery, EventStoreError, Result, Version,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

#[derive(Default)]
struct Log {
    /// Every record, in insertion order.
    records: Vec<EventEnvelope>,
    /// Positions in `records` per stream, ascending by version.
    streams: HashMap<AggregateId, Vec<usize>>,
}

impl Log {
    fn stream(&self, aggregate_id: AggregateId) -> impl Iterator<Item = &EventEnvelope> {
        self.streams
            .get(&aggregate_id)
            .into_iter()
            .flatten()
            .map(|&pos| &self.records[pos])
    }

    fn head(&self, aggregate_id: AggregateId) -> Option<Version> {
        self.stream(aggregate_id).last().map(|e| e.version)
    }

    fn push(&mut self, records: Vec<EventEnvelope>) {
        for record in records {
            let pos = self.records.len();
            self.streams
                .entry(record.aggregate_id)
                .or_default()
                .push(pos);
            self.records.push(record);
        }
    }
}

/// Record log held in process memory.
///
/// Saga runs interleave in one insertion-ordered vector, which is the order
/// [`EventStore::stream_all_events`] replays them in. A per-stream index of
/// positions keeps single-saga reads from scanning the whole log.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    log: Arc<RwLock<Log>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of records stored.
    pub async fn event_count(&self) -> usize {
        self.log.read().await.records.len()
    }

    /// Number of distinct streams, i.e. sagas that wrote at least one record.
    pub async fn stream_count(&self) -> usize {
        self.log.read().await.streams.len()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    #[tracing::instrument(skip(self, events), fields(count = events.len()))]
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;

        let Some(first) = events.first() else {
            return Err(EventStoreError::InvalidAppend(
                "cannot append an empty batch".to_string(),
            ));
        };
        let aggregate_id = first.aggregate_id;
        let starts_at = first.version;

        let mut log = self.log.write().await;
        let head = log.head(aggregate_id).unwrap_or(Version::initial());

        let expected = options.expected_version.unwrap_or(head);
        if head != expected || starts_at != head.next() {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: head,
            });
        }

        let new_head = events.last().map_or(head, |e| e.version);
        log.push(events);

        tracing::debug!(%aggregate_id, version = %new_head, "records appended");
        Ok(new_head)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        Ok(self.log.read().await.stream(aggregate_id).cloned().collect())
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        Ok(self
            .log
            .read()
            .await
            .records
            .iter()
            .filter(|e| query.matches(e))
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        let records = self.log.read().await.records.clone();
        Ok(Box::pin(stream::iter(records.into_iter().map(Ok))))
    }
}
