//! Domain layer for the accessory composition saga.
//!
//! - [`Aggregate`] / [`DomainEvent`]: replay traits for record-sourced types
//! - [`item`]: identifiers, balance sets, metadata and request validation

pub mod aggregate;
pub mod error;
pub mod item;

pub use aggregate::{Aggregate, DomainEvent, replay};
pub use error::DomainError;
pub use item::{
    AccountId, Amount, BalanceSet, ComposeRequest, ItemError, ItemId, SagaRequest, TokenMetadata,
    UnitAmount, UnitId, WireAmount,
};
