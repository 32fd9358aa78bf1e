pub mod health;
pub mod ledger;
pub mod metrics;
pub mod oracles;
pub mod sagas;
