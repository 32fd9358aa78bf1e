//! Accessory composition saga.
//!
//! Swaps accessory units locked against an item and then replaces the item's
//! metadata, across a balance ledger and a metadata store that share no
//! transaction. Each step is a separate queued call; the coordinator tracks
//! progress only through the data carried in each message.
//!
//! 1. Swap balances (lock set onto the item, unlock set back to the owner)
//! 2. Replace metadata
//! 3. On metadata failure, swap back with the sets exchanged
//!
//! If the compensating swap also fails the saga ends `FailedInconsistent`
//! and an `OperationFailedInconsistent` record is left for an operator.

pub mod aggregate;
pub mod budget;
pub mod composition;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod machine;
pub mod oracles;
pub mod runtime;
pub mod services;
pub mod state;

pub use aggregate::SagaRecord;
pub use budget::{BudgetValidator, Gas, HopCosts};
pub use context::{CallOutcome, Continuation, Dispatch, RemoteCall, SagaContext};
pub use coordinator::SagaCoordinator;
pub use error::{FailureKind, SagaError};
pub use events::SagaEvent;
pub use machine::{Transition, transition};
pub use oracles::OracleRegistry;
pub use runtime::{Mailbox, StepOutcome};
pub use services::{
    BalanceKey, BalanceLedger, HolderKey, InMemoryBalanceLedger, InMemoryMetadataStore,
    MetadataStore,
};
pub use state::SagaState;
