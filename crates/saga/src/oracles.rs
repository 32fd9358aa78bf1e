//! Accounts allowed to start composition sagas.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

use domain::AccountId;

use crate::error::{Result, SagaError};

/// Owner-managed set of oracle accounts.
///
/// The owner is registered as an oracle when the registry is created.
#[derive(Debug, Clone)]
pub struct OracleRegistry {
    owner: AccountId,
    oracles: Arc<RwLock<BTreeSet<AccountId>>>,
}

impl OracleRegistry {
    pub fn new(owner: AccountId) -> Self {
        let oracles = BTreeSet::from([owner.clone()]);
        Self {
            owner,
            oracles: Arc::new(RwLock::new(oracles)),
        }
    }

    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    #[tracing::instrument(skip(self))]
    pub fn add_oracle(&self, sender: &AccountId, account: &str) -> Result<AccountId> {
        self.ensure_owner(sender)?;
        let account = AccountId::parse(account)?;

        let mut oracles = self.oracles.write().unwrap_or_else(PoisonError::into_inner);
        if !oracles.insert(account.clone()) {
            return Err(SagaError::AlreadyOracle(account));
        }

        tracing::info!(%account, "oracle added");
        Ok(account)
    }

    #[tracing::instrument(skip(self))]
    pub fn remove_oracle(&self, sender: &AccountId, account: &str) -> Result<AccountId> {
        self.ensure_owner(sender)?;
        let account = AccountId::parse(account)?;

        let mut oracles = self.oracles.write().unwrap_or_else(PoisonError::into_inner);
        if !oracles.remove(&account) {
            return Err(SagaError::NotOracle(account));
        }

        tracing::info!(%account, "oracle removed");
        Ok(account)
    }

    pub fn is_oracle(&self, account: &AccountId) -> bool {
        self.oracles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(account)
    }

    pub fn oracles(&self) -> Vec<AccountId> {
        self.oracles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    fn ensure_owner(&self, sender: &AccountId) -> Result<()> {
        if sender != &self.owner {
            return Err(SagaError::NotOwner {
                sender: sender.clone(),
            });
        }
        Ok(())
    }
}
