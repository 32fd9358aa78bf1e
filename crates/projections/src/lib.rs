//! Read models over the saga record log.
//!
//! - [`Projection`] folds records into a view
//! - [`ProjectionProcessor`] feeds records from the store to projections
//! - [`UnresolvedOperationsView`] is the operator's queue of sagas that
//!   ended with their forward swap still applied
//! - [`ItemHistoryView`] lists the outcomes of every saga per item

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{
    ItemHistory, ItemHistoryView, ItemOutcome, UnresolvedOperation, UnresolvedOperationsView,
};
