//! Saga record aggregate.

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{AccountId, Aggregate, ItemId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::composition;
use crate::events::SagaEvent;
use crate::state::SagaState;

/// A saga's history folded from its record stream.
///
/// Read-only: the coordinator never consults it to make decisions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SagaRecord {
    id: Option<AggregateId>,
    version: Version,
    saga_type: String,
    item_id: Option<ItemId>,
    item_owner: Option<AccountId>,
    caller: Option<AccountId>,
    state: SagaState,
    completed_steps: Vec<String>,
    failure_reason: Option<String>,
    started_at: Option<DateTime<Utc>>,
}

impl Aggregate for SagaRecord {
    type Event = SagaEvent;

    fn aggregate_type() -> &'static str {
        "AccessoryCompositionSaga"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            SagaEvent::SagaStarted(data) => {
                self.id = Some(data.saga_id);
                self.saga_type = data.saga_type;
                self.item_id = Some(data.item_id);
                self.item_owner = Some(data.item_owner);
                self.caller = Some(data.caller);
                self.started_at = Some(data.started_at);
                self.state = SagaState::AwaitingMetadataResult;
            }
            SagaEvent::StepCompleted(data) => {
                if data.step_name == composition::STEP_SWAP_BALANCES {
                    self.state = SagaState::AwaitingRollbackDecision;
                }
                self.completed_steps.push(data.step_name);
            }
            SagaEvent::StepFailed(data) => {
                self.failure_reason = Some(format!("{}: {}", data.step_name, data.error));
            }
            SagaEvent::CompensationStarted(_) => {
                self.state = SagaState::AwaitingRollbackResult;
            }
            SagaEvent::OperationSucceeded(_) => {
                self.state = SagaState::Completed;
            }
            SagaEvent::OperationFailedClean(_) => {
                self.state = SagaState::FailedClean;
            }
            SagaEvent::OperationFailedInconsistent(_) => {
                self.state = SagaState::FailedInconsistent;
            }
        }
    }
}

// Query methods
impl SagaRecord {
    pub fn state(&self) -> SagaState {
        self.state
    }

    pub fn saga_type(&self) -> &str {
        &self.saga_type
    }

    pub fn item_id(&self) -> Option<&ItemId> {
        self.item_id.as_ref()
    }

    pub fn item_owner(&self) -> Option<&AccountId> {
        self.item_owner.as_ref()
    }

    /// The oracle that started the saga.
    pub fn caller(&self) -> Option<&AccountId> {
        self.caller.as_ref()
    }

    pub fn completed_steps(&self) -> &[String] {
        &self.completed_steps
    }

    /// The most recent step failure, as `step: error`.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::Gas;
    use domain::{ComposeRequest, SagaRequest, TokenMetadata};

    fn request() -> SagaRequest {
        ComposeRequest {
            item_id: "77".to_string(),
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

    fn started(saga_id: AggregateId) -> SagaEvent {
        SagaEvent::saga_started(
            saga_id,
            AccountId::parse("owner.near").unwrap(),
            &request(),
            Gas::from_tgas(90),
            Utc::now(),
        )
    }

    #[test]
    fn happy_path_replay() {
        let saga_id = AggregateId::new();
        let mut record = SagaRecord::default();
        record.apply(started(saga_id));
        assert_eq!(record.state(), SagaState::AwaitingMetadataResult);

        record.apply_events(vec![
            SagaEvent::step_completed(composition::STEP_SWAP_BALANCES),
            SagaEvent::step_completed(composition::STEP_REPLACE_METADATA),
            SagaEvent::operation_succeeded(&request()),
        ]);

        assert_eq!(record.id(), Some(saga_id));
        assert_eq!(record.state(), SagaState::Completed);
        assert_eq!(record.saga_type(), composition::SAGA_TYPE);
        assert_eq!(record.item_id().map(ItemId::as_str), Some("77"));
        assert_eq!(
            record.completed_steps(),
            &["swap_balances", "replace_metadata"]
        );
        assert!(record.failure_reason().is_none());
    }

    #[test]
    fn compensation_replay() {
        let mut record = SagaRecord::default();
        record.apply_events(vec![
            started(AggregateId::new()),
            SagaEvent::step_completed(composition::STEP_SWAP_BALANCES),
            SagaEvent::step_failed(composition::STEP_REPLACE_METADATA, "Token is locked"),
            SagaEvent::compensation_started(composition::STEP_REPLACE_METADATA),
        ]);
        assert_eq!(record.state(), SagaState::AwaitingRollbackResult);
        assert_eq!(
            record.failure_reason(),
            Some("replace_metadata: Token is locked")
        );

        record.apply(SagaEvent::operation_failed_inconsistent(&request(), "outage"));
        assert_eq!(record.state(), SagaState::FailedInconsistent);
        assert!(record.is_terminal());
    }
}
