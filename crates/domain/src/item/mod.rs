//! Items, accessory units and the requests that recompose them.

mod metadata;
mod request;
mod value_objects;

pub use metadata::TokenMetadata;
pub use request::{ComposeRequest, SagaRequest};
pub use value_objects::{AccountId, Amount, BalanceSet, ItemId, UnitAmount, UnitId, WireAmount};

use thiserror::Error;

/// Structural problems found while parsing item-domain input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    #[error("Invalid account id: '{value}'")]
    InvalidAccountId { value: String },

    #[error("Invalid item id: '{value}'")]
    InvalidItemId { value: String },

    /// Unit ids must be decimal integers.
    #[error("Invalid token id: '{value}'")]
    InvalidUnitId { value: String },

    #[error("Invalid amount: '{value}' (must be a non-negative integer)")]
    InvalidAmount { value: String },

    #[error("{field}: {ids} token ids but {amounts} amounts")]
    LengthMismatch {
        field: &'static str,
        ids: usize,
        amounts: usize,
    },
}
