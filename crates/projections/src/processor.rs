//! Feeds records from the store to registered projections.

use event_store::{EventEnvelope, EventStore};
use futures_util::StreamExt;

use crate::Result;
use crate::projection::Projection;

/// Delivers records from an event store to projections.
///
/// Catch-up replays the whole log in insertion order and skips records a
/// projection has already counted. Single-record delivery is for callers
/// that just appended something. Rebuild resets every projection first.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
        }
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    pub fn projection_names(&self) -> Vec<&'static str> {
        self.projections.iter().map(|p| p.name()).collect()
    }

    /// Streams the log and hands each record to every projection that has
    /// not seen it yet. Returns the number of records read.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let mut stream = self.store.stream_all_events().await?;
        let mut event_index: u64 = 0;

        while let Some(result) = stream.next().await {
            let event = result?;
            event_index += 1;

            for projection in &self.projections {
                if projection.position().await.events_processed < event_index {
                    projection.handle(&event).await?;
                    metrics::counter!("projections_events_processed", "projection" => projection.name())
                        .increment(1);
                }
            }
        }

        tracing::debug!(events_read = event_index, "catch-up complete");
        Ok(event_index)
    }

    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn process_event(&self, event: &EventEnvelope) -> Result<()> {
        for projection in &self.projections {
            projection.handle(event).await?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<u64> {
        for projection in &self.projections {
            projection.reset().await?;
        }
        let read = self.run_catch_up().await?;
        tracing::info!(
            projections = self.projections.len(),
            events_read = read,
            "projections rebuilt"
        );
        Ok(read)
    }
}
