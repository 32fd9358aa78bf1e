//! Collaborators the saga calls, with in-memory implementations.

pub mod ledger;
pub mod metadata;

pub use ledger::{BalanceKey, BalanceLedger, HolderKey, InMemoryBalanceLedger};
pub use metadata::{InMemoryMetadataStore, MetadataStore};
