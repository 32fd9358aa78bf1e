//! Records written by composition sagas.

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{AccountId, BalanceSet, DomainEvent, ItemId, SagaRequest, TokenMetadata};
use serde::{Deserialize, Serialize};

use crate::budget::Gas;

/// Records appended to a saga's stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SagaEvent {
    /// The request passed validation and the forward swap was dispatched.
    SagaStarted(SagaStartedData),

    StepCompleted(StepData),

    StepFailed(StepFailedData),

    /// The compensating swap was dispatched.
    CompensationStarted(CompensationData),

    /// Terminal: swap and metadata both applied.
    OperationSucceeded(OperationData),

    /// Terminal: failed with no lasting ledger effect.
    OperationFailedClean(OperationFailedCleanData),

    /// Terminal: the compensating swap failed, the forward swap still stands.
    OperationFailedInconsistent(OperationFailedInconsistentData),
}

impl DomainEvent for SagaEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SagaEvent::SagaStarted(_) => "SagaStarted",
            SagaEvent::StepCompleted(_) => "StepCompleted",
            SagaEvent::StepFailed(_) => "StepFailed",
            SagaEvent::CompensationStarted(_) => "CompensationStarted",
            SagaEvent::OperationSucceeded(_) => "OperationSucceeded",
            SagaEvent::OperationFailedClean(_) => "OperationFailedClean",
            SagaEvent::OperationFailedInconsistent(_) => "OperationFailedInconsistent",
        }
    }
}

impl SagaEvent {
    /// Record type names of the three terminal records.
    pub const TERMINAL_TYPES: [&'static str; 3] = [
        "OperationSucceeded",
        "OperationFailedClean",
        "OperationFailedInconsistent",
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaEvent::OperationSucceeded(_)
                | SagaEvent::OperationFailedClean(_)
                | SagaEvent::OperationFailedInconsistent(_)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaStartedData {
    pub saga_id: AggregateId,
    pub saga_type: String,
    /// The oracle that started the saga.
    pub caller: AccountId,
    pub item_id: ItemId,
    pub item_owner: AccountId,
    pub lock_set: BalanceSet,
    pub unlock_set: BalanceSet,
    pub metadata: TokenMetadata,
    pub attached_gas: Gas,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepData {
    pub step_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepFailedData {
    pub step_name: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompensationData {
    /// The step whose failure triggered compensation.
    pub from_step: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationData {
    pub item_id: ItemId,
    pub lock_set: BalanceSet,
    pub unlock_set: BalanceSet,
    pub metadata: TokenMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationFailedCleanData {
    pub item_id: ItemId,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationFailedInconsistentData {
    pub item_id: ItemId,
    /// The forward sets, still applied on the ledger.
    pub lock_set: BalanceSet,
    pub unlock_set: BalanceSet,
    /// The metadata that was never stored.
    pub metadata: TokenMetadata,
    /// Why the compensating swap failed.
    pub error: String,
}

// Convenience constructors
impl SagaEvent {
    pub fn saga_started(
        saga_id: AggregateId,
        caller: AccountId,
        request: &SagaRequest,
        attached_gas: Gas,
        started_at: DateTime<Utc>,
    ) -> Self {
        SagaEvent::SagaStarted(SagaStartedData {
            saga_id,
            saga_type: crate::composition::SAGA_TYPE.to_string(),
            caller,
            item_id: request.item_id.clone(),
            item_owner: request.item_owner.clone(),
            lock_set: request.lock_set.clone(),
            unlock_set: request.unlock_set.clone(),
            metadata: request.new_metadata.clone(),
            attached_gas,
            started_at,
        })
    }

    pub fn step_completed(step_name: impl Into<String>) -> Self {
        SagaEvent::StepCompleted(StepData {
            step_name: step_name.into(),
        })
    }

    pub fn step_failed(step_name: impl Into<String>, error: impl Into<String>) -> Self {
        SagaEvent::StepFailed(StepFailedData {
            step_name: step_name.into(),
            error: error.into(),
        })
    }

    pub fn compensation_started(from_step: impl Into<String>) -> Self {
        SagaEvent::CompensationStarted(CompensationData {
            from_step: from_step.into(),
        })
    }

    pub fn operation_succeeded(request: &SagaRequest) -> Self {
        SagaEvent::OperationSucceeded(OperationData {
            item_id: request.item_id.clone(),
            lock_set: request.lock_set.clone(),
            unlock_set: request.unlock_set.clone(),
            metadata: request.new_metadata.clone(),
        })
    }

    pub fn operation_failed_clean(item_id: &ItemId, reason: impl Into<String>) -> Self {
        SagaEvent::OperationFailedClean(OperationFailedCleanData {
            item_id: item_id.clone(),
            reason: reason.into(),
        })
    }

    pub fn operation_failed_inconsistent(request: &SagaRequest, error: impl Into<String>) -> Self {
        SagaEvent::OperationFailedInconsistent(OperationFailedInconsistentData {
            item_id: request.item_id.clone(),
            lock_set: request.lock_set.clone(),
            unlock_set: request.unlock_set.clone(),
            metadata: request.new_metadata.clone(),
            error: error.into(),
        })
    }
}
