//! Data threaded from one hop of a saga to the next.
//!
//! Nothing survives between a dispatch and its continuation except what is
//! in these values. They are plain serializable data.

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{AccountId, BalanceSet, ItemId, SagaRequest, TokenMetadata};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::composition;
use crate::state::SagaState;

/// Everything a continuation needs to resume a saga.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaContext {
    pub saga_id: AggregateId,
    pub request: SagaRequest,
    /// Current version of the saga's record stream.
    pub record_version: Version,
    pub started_at: DateTime<Utc>,
}

impl SagaContext {
    pub fn new(saga_id: AggregateId, request: SagaRequest, started_at: DateTime<Utc>) -> Self {
        Self {
            saga_id,
            request,
            record_version: Version::initial(),
            started_at,
        }
    }

    pub fn item_id(&self) -> &ItemId {
        &self.request.item_id
    }
}

/// A call to one of the collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum RemoteCall {
    SwapBalances {
        item_id: ItemId,
        holder: AccountId,
        lock_set: BalanceSet,
        unlock_set: BalanceSet,
    },
    ReplaceMetadata {
        item_id: ItemId,
        metadata: TokenMetadata,
    },
    /// Same ledger operation as `SwapBalances`, with the sets already exchanged.
    RollbackBalances {
        item_id: ItemId,
        holder: AccountId,
        lock_set: BalanceSet,
        unlock_set: BalanceSet,
    },
}

impl RemoteCall {
    pub fn swap(request: &SagaRequest) -> Self {
        RemoteCall::SwapBalances {
            item_id: request.item_id.clone(),
            holder: request.item_owner.clone(),
            lock_set: request.lock_set.clone(),
            unlock_set: request.unlock_set.clone(),
        }
    }

    pub fn replace_metadata(request: &SagaRequest) -> Self {
        RemoteCall::ReplaceMetadata {
            item_id: request.item_id.clone(),
            metadata: request.new_metadata.clone(),
        }
    }

    /// The reversal of `request`'s swap, reusing its amounts verbatim.
    pub fn rollback(request: &SagaRequest) -> Self {
        let reversal = request.swapped();
        RemoteCall::RollbackBalances {
            item_id: reversal.item_id,
            holder: reversal.item_owner,
            lock_set: reversal.lock_set,
            unlock_set: reversal.unlock_set,
        }
    }

    pub fn step_name(&self) -> &'static str {
        match self {
            RemoteCall::SwapBalances { .. } => composition::STEP_SWAP_BALANCES,
            RemoteCall::ReplaceMetadata { .. } => composition::STEP_REPLACE_METADATA,
            RemoteCall::RollbackBalances { .. } => composition::STEP_ROLLBACK_BALANCES,
        }
    }
}

/// The entry point to invoke once a call resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Continuation {
    /// One of the continuation states; names the entry point.
    pub state: SagaState,
    pub context: SagaContext,
}

/// A queued remote call together with its continuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispatch {
    pub call: RemoteCall,
    pub then: Continuation,
}

/// Result of the call a continuation was scheduled behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallOutcome {
    Succeeded,
    Failed(String),
}

impl CallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Succeeded)
    }
}

impl<E: std::fmt::Display> From<std::result::Result<(), E>> for CallOutcome {
    fn from(result: std::result::Result<(), E>) -> Self {
        match result {
            Ok(()) => CallOutcome::Succeeded,
            Err(e) => CallOutcome::Failed(e.to_string()),
        }
    }
}
