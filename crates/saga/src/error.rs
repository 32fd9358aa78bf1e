//! Saga error types.

use domain::{AccountId, DomainError, ItemError};
use event_store::EventStoreError;
use thiserror::Error;

use crate::budget::Gas;
use crate::state::SagaState;

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The caller is not a registered oracle.
    #[error("Account {caller} is not authorized to start a composition")]
    Unauthorized { caller: AccountId },

    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] ItemError),

    #[error("Insufficient budget: attached {attached}, worst case requires {required}")]
    InsufficientBudget { attached: Gas, required: Gas },

    /// The declared hop costs do not fit in a `Gas` value.
    #[error("Worst-case budget overflows")]
    BudgetOverflow,

    /// Oracle administration attempted by someone other than the owner.
    #[error("Only the owner can manage oracles, got {sender}")]
    NotOwner { sender: AccountId },

    #[error("Account {0} is already an oracle")]
    AlreadyOracle(AccountId),

    #[error("Account {0} is not an oracle")]
    NotOracle(AccountId),

    /// The balance ledger refused a call. Nothing was applied.
    #[error("Ledger rejected the call: {0}")]
    LedgerRejected(String),

    /// The metadata store refused a call. The record is unchanged.
    #[error("Metadata store rejected the call: {0}")]
    MetadataRejected(String),

    /// The compensating swap failed after a committed forward swap.
    #[error("Rollback failed: {0}")]
    RollbackRejected(String),

    /// An outcome was delivered to a state that does not await one.
    #[error("Invalid saga state: cannot {action} in {state}")]
    InvalidState {
        state: SagaState,
        action: &'static str,
    },

    /// The runtime mailbox has no receiver.
    #[error("Saga mailbox is closed")]
    MailboxClosed,

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),
}

/// Failure classes of a composition saga.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Rejected before any remote call.
    Validation,
    /// The forward swap failed; nothing to undo.
    LedgerRejection,
    /// The metadata call failed; triggers the compensating swap.
    MetadataRejection,
    /// The compensating swap failed; left for an operator.
    RollbackRejection,
    Infrastructure,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Validation => "validation",
            FailureKind::LedgerRejection => "ledger_rejection",
            FailureKind::MetadataRejection => "metadata_rejection",
            FailureKind::RollbackRejection => "rollback_rejection",
            FailureKind::Infrastructure => "infrastructure",
        }
    }
}

impl SagaError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SagaError::Unauthorized { .. }
            | SagaError::InvalidRequest(_)
            | SagaError::InsufficientBudget { .. }
            | SagaError::BudgetOverflow
            | SagaError::NotOwner { .. }
            | SagaError::AlreadyOracle(_)
            | SagaError::NotOracle(_) => FailureKind::Validation,
            SagaError::LedgerRejected(_) => FailureKind::LedgerRejection,
            SagaError::MetadataRejected(_) => FailureKind::MetadataRejection,
            SagaError::RollbackRejected(_) => FailureKind::RollbackRejection,
            SagaError::InvalidState { .. }
            | SagaError::MailboxClosed
            | SagaError::Domain(_)
            | SagaError::EventStore(_) => FailureKind::Infrastructure,
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_classified() {
        let caller = AccountId::parse("mallory.near").unwrap();
        assert_eq!(
            SagaError::Unauthorized { caller }.kind(),
            FailureKind::Validation
        );
        assert_eq!(
            SagaError::InvalidRequest(ItemError::InvalidAmount {
                value: "-1".to_string()
            })
            .kind(),
            FailureKind::Validation
        );
        assert_eq!(
            SagaError::InsufficientBudget {
                attached: Gas::new(1),
                required: Gas::new(2)
            }
            .kind(),
            FailureKind::Validation
        );
    }

    #[test]
    fn remote_failures_keep_their_class() {
        assert_eq!(
            SagaError::LedgerRejected("Insufficient balance".into()).kind(),
            FailureKind::LedgerRejection
        );
        assert_eq!(
            SagaError::MetadataRejected("Token is locked".into()).kind(),
            FailureKind::MetadataRejection
        );
        assert_eq!(
            SagaError::RollbackRejected("outage".into()).kind(),
            FailureKind::RollbackRejection
        );
        assert_eq!(SagaError::MailboxClosed.kind().as_str(), "infrastructure");
    }
}
