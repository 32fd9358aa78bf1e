use crate::EventEnvelope;

/// Filter over the record log. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub aggregate_type: Option<String>,
    /// Matches records whose metadata holds this exact string value.
    pub metadata: Option<(String, String)>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    /// Restricts results to records correlated by `key == value`, e.g. every
    /// record written for one item.
    pub fn metadata_eq(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata = Some((key.into(), value.into()));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if `event` passes every filter except limit and offset.
    pub fn matches(&self, event: &EventEnvelope) -> bool {
        if let Some(ref agg_type) = self.aggregate_type
            && &event.aggregate_type != agg_type
        {
            return false;
        }
        if let Some((ref key, ref value)) = self.metadata
            && event.metadata_str(key) != Some(value.as_str())
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AggregateId, Version};

    fn record(aggregate_type: &str, item: &str) -> EventEnvelope {
        EventEnvelope::builder()
            .event_type("SagaStarted")
            .aggregate_id(AggregateId::new())
            .aggregate_type(aggregate_type)
            .version(Version::first())
            .payload_raw(serde_json::json!({}))
            .metadata("item_id", serde_json::json!(item))
            .build()
            .unwrap()
    }

    #[test]
    fn empty_query_matches_everything() {
        assert!(EventQuery::new().matches(&record("AccessoryCompositionSaga", "77")));
    }

    #[test]
    fn metadata_filter_selects_one_item() {
        let query = EventQuery::new().metadata_eq("item_id", "77");
        assert!(query.matches(&record("AccessoryCompositionSaga", "77")));
        assert!(!query.matches(&record("AccessoryCompositionSaga", "78")));
    }

    #[test]
    fn type_and_metadata_filters_combine() {
        let query = EventQuery::new()
            .aggregate_type("AccessoryCompositionSaga")
            .metadata_eq("item_id", "77");
        assert!(query.matches(&record("AccessoryCompositionSaga", "77")));
        assert!(!query.matches(&record("Counter", "77")));
    }

    #[test]
    fn paging_is_not_part_of_matching() {
        let query = EventQuery::new().limit(1).offset(5);
        assert_eq!(query.limit, Some(1));
        assert_eq!(query.offset, Some(5));
        assert!(query.matches(&record("AccessoryCompositionSaga", "77")));
    }
}
