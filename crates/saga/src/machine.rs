//! The composition saga's transition table.
//!
//! Pure functions from (state, outcome of the last call) to the next state,
//! the next call to dispatch, and the records to append. No I/O happens
//! here; the coordinator performs what a [`Transition`] describes.

use domain::SagaRequest;

use crate::composition::{STEP_REPLACE_METADATA, STEP_ROLLBACK_BALANCES, STEP_SWAP_BALANCES};
use crate::context::{CallOutcome, RemoteCall};
use crate::error::{Result, SagaError};
use crate::events::SagaEvent;
use crate::state::SagaState;

/// What to do after a state is entered.
#[derive(Debug, Clone)]
pub struct Transition {
    pub next: SagaState,
    /// The call to dispatch, or `None` if `next` is terminal.
    pub call: Option<RemoteCall>,
    pub records: Vec<SagaEvent>,
}

/// Reason recorded when the forward swap is refused.
pub const REASON_LEDGER_REJECTED: &str = "balance swap rejected; nothing was applied";

/// Reason recorded when the compensating swap restored the balances.
pub const REASON_ROLLED_BACK: &str = "metadata update failed; balances restored";

/// The first hop of a validated request: dispatch the forward swap.
pub fn begin(request: &SagaRequest) -> Transition {
    Transition {
        next: SagaState::AwaitingMetadataResult,
        call: Some(RemoteCall::swap(request)),
        records: Vec::new(),
    }
}

/// Advances a saga waiting in `state` once its outstanding call resolved
/// with `outcome`.
pub fn transition(
    state: SagaState,
    outcome: CallOutcome,
    request: &SagaRequest,
) -> Result<Transition> {
    use CallOutcome::{Failed, Succeeded};

    let transition = match (state, outcome) {
        (SagaState::AwaitingMetadataResult, Succeeded) => Transition {
            next: SagaState::AwaitingRollbackDecision,
            call: Some(RemoteCall::replace_metadata(request)),
            records: vec![SagaEvent::step_completed(STEP_SWAP_BALANCES)],
        },
        // The ledger is all-or-nothing per call, so there is nothing to undo.
        (SagaState::AwaitingMetadataResult, Failed(error)) => Transition {
            next: SagaState::FailedClean,
            call: None,
            records: vec![
                SagaEvent::step_failed(STEP_SWAP_BALANCES, error),
                SagaEvent::operation_failed_clean(&request.item_id, REASON_LEDGER_REJECTED),
            ],
        },
        (SagaState::AwaitingRollbackDecision, Succeeded) => Transition {
            next: SagaState::Completed,
            call: None,
            records: vec![
                SagaEvent::step_completed(STEP_REPLACE_METADATA),
                SagaEvent::operation_succeeded(request),
            ],
        },
        (SagaState::AwaitingRollbackDecision, Failed(error)) => Transition {
            next: SagaState::AwaitingRollbackResult,
            call: Some(RemoteCall::rollback(request)),
            records: vec![
                SagaEvent::step_failed(STEP_REPLACE_METADATA, error),
                SagaEvent::compensation_started(STEP_REPLACE_METADATA),
            ],
        },
        (SagaState::AwaitingRollbackResult, Succeeded) => Transition {
            next: SagaState::FailedClean,
            call: None,
            records: vec![
                SagaEvent::step_completed(STEP_ROLLBACK_BALANCES),
                SagaEvent::operation_failed_clean(&request.item_id, REASON_ROLLED_BACK),
            ],
        },
        (SagaState::AwaitingRollbackResult, Failed(error)) => Transition {
            next: SagaState::FailedInconsistent,
            call: None,
            records: vec![
                SagaEvent::step_failed(STEP_ROLLBACK_BALANCES, error.clone()),
                SagaEvent::operation_failed_inconsistent(request, error),
            ],
        },
        (state, _) => {
            return Err(SagaError::InvalidState {
                state,
                action: "accept a call outcome",
            });
        }
    };

    Ok(transition)
}
