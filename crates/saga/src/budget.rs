//! Execution budget pre-check.
//!
//! A saga that has dispatched its first call cannot be abandoned, so the
//! caller must attach enough gas up front for the longest path: forward
//! swap, metadata replacement, compensating swap, and one reporting hop for
//! each of the three continuations.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SagaError};

/// Units of execution budget.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Gas(u64);

impl Gas {
    pub const ONE_TGAS: u64 = 1_000_000_000_000;

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn from_tgas(tgas: u64) -> Self {
        Self(tgas * Self::ONE_TGAS)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn checked_add(self, other: Gas) -> Option<Gas> {
        self.0.checked_add(other.0).map(Gas)
    }

    pub fn checked_mul(self, factor: u64) -> Option<Gas> {
        self.0.checked_mul(factor).map(Gas)
    }
}

impl std::fmt::Display for Gas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Gas {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Declared cost of each hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopCosts {
    pub lock_unlock_call: Gas,
    pub metadata_call: Gas,
    pub rollback_call: Gas,
    /// Charged once per continuation.
    pub reporting_call: Gas,
}

impl HopCosts {
    /// Continuations on the longest path.
    pub const CONTINUATION_HOPS: u64 = 3;

    /// Forward path plus compensating path, or `None` on overflow.
    pub fn worst_case(&self) -> Option<Gas> {
        self.lock_unlock_call
            .checked_add(self.metadata_call)?
            .checked_add(self.rollback_call)?
            .checked_add(self.reporting_call.checked_mul(Self::CONTINUATION_HOPS)?)
    }
}

impl Default for HopCosts {
    fn default() -> Self {
        Self {
            lock_unlock_call: Gas::from_tgas(20),
            metadata_call: Gas::from_tgas(20),
            rollback_call: Gas::from_tgas(20),
            reporting_call: Gas::from_tgas(10),
        }
    }
}

/// Rejects start requests that could not pay for the worst-case path.
#[derive(Debug, Clone, Copy, Default)]
pub struct BudgetValidator {
    costs: HopCosts,
}

impl BudgetValidator {
    pub fn new(costs: HopCosts) -> Self {
        Self { costs }
    }

    pub fn costs(&self) -> &HopCosts {
        &self.costs
    }

    pub fn required(&self) -> Result<Gas> {
        self.costs.worst_case().ok_or(SagaError::BudgetOverflow)
    }

    /// Returns the required budget if `attached` covers it.
    pub fn check(&self, attached: Gas) -> Result<Gas> {
        let required = self.required()?;
        if attached < required {
            return Err(SagaError::InsufficientBudget { attached, required });
        }
        Ok(required)
    }
}
