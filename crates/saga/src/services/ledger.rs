//! Balance ledger trait and in-memory implementation.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use async_trait::async_trait;
use domain::{AccountId, Amount, BalanceSet, ItemId, UnitId};

use crate::error::SagaError;

/// Who holds a balance: an account, or an item the units are locked against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HolderKey {
    Account(AccountId),
    Item(ItemId),
}

impl fmt::Display for HolderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HolderKey::Account(account) => write!(f, "{account}"),
            HolderKey::Item(item) => write!(f, "nft:{item}"),
        }
    }
}

/// A ledger entry key. Displays as `account:unit` or `nft:item:unit`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BalanceKey {
    pub holder: HolderKey,
    pub unit_id: UnitId,
}

impl BalanceKey {
    pub fn account(account: &AccountId, unit_id: &UnitId) -> Self {
        Self {
            holder: HolderKey::Account(account.clone()),
            unit_id: unit_id.clone(),
        }
    }

    pub fn item(item_id: &ItemId, unit_id: &UnitId) -> Self {
        Self {
            holder: HolderKey::Item(item_id.clone()),
            unit_id: unit_id.clone(),
        }
    }
}

impl fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.holder, self.unit_id)
    }
}

/// Per-(holder, unit) quantities of fungible accessory units.
#[async_trait]
pub trait BalanceLedger: Send + Sync {
    /// Moves every `lock_set` entry from `holder` onto the item, then every
    /// `unlock_set` entry from the item back to `holder`.
    ///
    /// All-or-nothing: if any entry would go negative, nothing is applied.
    async fn swap_balances(
        &self,
        caller: &AccountId,
        item_id: &ItemId,
        holder: &AccountId,
        lock_set: &BalanceSet,
        unlock_set: &BalanceSet,
    ) -> Result<(), SagaError>;

    async fn balance_of(&self, account: &AccountId, unit_id: &UnitId) -> Amount;

    async fn locked_balance_of(&self, item_id: &ItemId, unit_id: &UnitId) -> Amount;

    async fn supply_of(&self, unit_id: &UnitId) -> Amount;

    /// Creates units for `owner`.
    async fn mint(
        &self,
        caller: &AccountId,
        owner: &AccountId,
        set: &BalanceSet,
    ) -> Result<(), SagaError>;

    /// Moves units from the caller's own balance to `receiver`.
    async fn transfer(
        &self,
        caller: &AccountId,
        receiver: &AccountId,
        unit_id: &UnitId,
        amount: Amount,
    ) -> Result<(), SagaError>;
}

const INSUFFICIENT_BALANCE: &str = "Insufficient balance";
const BALANCE_OVERFLOW: &str = "Balance overflow";
const NOT_MINTER: &str = "Only minters can call this method";
const UNAVAILABLE: &str = "Ledger unavailable";

#[derive(Debug, Default)]
struct InMemoryLedgerState {
    balances: HashMap<BalanceKey, Amount>,
    supplies: HashMap<UnitId, Amount>,
    minters: BTreeSet<AccountId>,
    swaps_applied: usize,
    fail_on_swap: bool,
    fail_swaps_after: Option<usize>,
}

impl InMemoryLedgerState {
    fn ensure_minter(&self, caller: &AccountId) -> Result<(), SagaError> {
        if !self.minters.contains(caller) {
            return Err(SagaError::LedgerRejected(NOT_MINTER.to_string()));
        }
        Ok(())
    }

    fn swap_is_failing(&self) -> bool {
        self.fail_on_swap
            || self
                .fail_swaps_after
                .is_some_and(|limit| self.swaps_applied >= limit)
    }
}

fn read(balances: &HashMap<BalanceKey, Amount>, key: &BalanceKey) -> Amount {
    balances.get(key).copied().unwrap_or_default()
}

fn debit(
    balances: &mut HashMap<BalanceKey, Amount>,
    key: BalanceKey,
    amount: Amount,
) -> Result<(), SagaError> {
    let remaining = read(balances, &key)
        .checked_sub(amount)
        .ok_or_else(|| SagaError::LedgerRejected(INSUFFICIENT_BALANCE.to_string()))?;
    balances.insert(key, remaining);
    Ok(())
}

fn credit(
    balances: &mut HashMap<BalanceKey, Amount>,
    key: BalanceKey,
    amount: Amount,
) -> Result<(), SagaError> {
    let total = read(balances, &key)
        .checked_add(amount)
        .ok_or_else(|| SagaError::LedgerRejected(BALANCE_OVERFLOW.to_string()))?;
    balances.insert(key, total);
    Ok(())
}

/// In-memory balance ledger for tests and the development server.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBalanceLedger {
    state: Arc<RwLock<InMemoryLedgerState>>,
}

impl InMemoryBalanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a ledger with `minter` authorized.
    pub fn with_minter(minter: AccountId) -> Self {
        let ledger = Self::new();
        ledger.add_minter(minter);
        ledger
    }

    pub fn add_minter(&self, minter: AccountId) {
        self.state().minters.insert(minter);
    }

    pub fn remove_minter(&self, minter: &AccountId) {
        self.state().minters.remove(minter);
    }

    /// Makes every swap fail while set.
    pub fn set_fail_on_swap(&self, fail: bool) {
        self.state().fail_on_swap = fail;
    }

    /// Lets `n` more swaps succeed, then fails every later one.
    pub fn fail_swaps_after(&self, n: usize) {
        let mut state = self.state();
        state.fail_swaps_after = Some(state.swaps_applied + n);
    }

    /// Number of swaps applied so far.
    pub fn swap_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .swaps_applied
    }

    /// Every non-zero entry keyed by its storage key.
    pub fn snapshot(&self) -> HashMap<String, Amount> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .balances
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(key, amount)| (key.to_string(), *amount))
            .collect()
    }

    fn state(&self) -> RwLockWriteGuard<'_, InMemoryLedgerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn view(&self, key: &BalanceKey) -> Amount {
        read(
            &self
                .state
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .balances,
            key,
        )
    }
}

#[async_trait]
impl BalanceLedger for InMemoryBalanceLedger {
    async fn swap_balances(
        &self,
        caller: &AccountId,
        item_id: &ItemId,
        holder: &AccountId,
        lock_set: &BalanceSet,
        unlock_set: &BalanceSet,
    ) -> Result<(), SagaError> {
        let mut state = self.state();
        state.ensure_minter(caller)?;

        if state.swap_is_failing() {
            return Err(SagaError::LedgerRejected(UNAVAILABLE.to_string()));
        }

        let mut staged = state.balances.clone();
        for entry in lock_set {
            debit(
                &mut staged,
                BalanceKey::account(holder, &entry.unit_id),
                entry.amount,
            )?;
            credit(
                &mut staged,
                BalanceKey::item(item_id, &entry.unit_id),
                entry.amount,
            )?;
        }
        for entry in unlock_set {
            debit(
                &mut staged,
                BalanceKey::item(item_id, &entry.unit_id),
                entry.amount,
            )?;
            credit(
                &mut staged,
                BalanceKey::account(holder, &entry.unit_id),
                entry.amount,
            )?;
        }

        state.balances = staged;
        state.swaps_applied += 1;
        Ok(())
    }

    async fn balance_of(&self, account: &AccountId, unit_id: &UnitId) -> Amount {
        self.view(&BalanceKey::account(account, unit_id))
    }

    async fn locked_balance_of(&self, item_id: &ItemId, unit_id: &UnitId) -> Amount {
        self.view(&BalanceKey::item(item_id, unit_id))
    }

    async fn supply_of(&self, unit_id: &UnitId) -> Amount {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .supplies
            .get(unit_id)
            .copied()
            .unwrap_or_default()
    }

    async fn mint(
        &self,
        caller: &AccountId,
        owner: &AccountId,
        set: &BalanceSet,
    ) -> Result<(), SagaError> {
        let mut state = self.state();
        state.ensure_minter(caller)?;

        let mut balances = state.balances.clone();
        let mut supplies = state.supplies.clone();
        for entry in set {
            credit(
                &mut balances,
                BalanceKey::account(owner, &entry.unit_id),
                entry.amount,
            )?;
            let supply = supplies
                .get(&entry.unit_id)
                .copied()
                .unwrap_or_default()
                .checked_add(entry.amount)
                .ok_or_else(|| SagaError::LedgerRejected(BALANCE_OVERFLOW.to_string()))?;
            supplies.insert(entry.unit_id.clone(), supply);
        }

        state.balances = balances;
        state.supplies = supplies;
        Ok(())
    }

    async fn transfer(
        &self,
        caller: &AccountId,
        receiver: &AccountId,
        unit_id: &UnitId,
        amount: Amount,
    ) -> Result<(), SagaError> {
        let mut state = self.state();
        state.ensure_minter(caller)?;

        let mut staged = state.balances.clone();
        debit(&mut staged, BalanceKey::account(caller, unit_id), amount)?;
        credit(&mut staged, BalanceKey::account(receiver, unit_id), amount)?;
        state.balances = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::UnitAmount;

    fn account(name: &str) -> AccountId {
        AccountId::parse(name).unwrap()
    }

    fn unit(id: &str) -> UnitId {
        UnitId::parse(id).unwrap()
    }

    fn set(entries: &[(&str, u128)]) -> BalanceSet {
        entries
            .iter()
            .map(|(id, amount)| UnitAmount::new(unit(id), Amount::new(*amount)))
            .collect()
    }

    async fn funded() -> (InMemoryBalanceLedger, AccountId, AccountId, ItemId) {
        let minter = account("composition.near");
        let alice = account("alice.near");
        let ledger = InMemoryBalanceLedger::with_minter(minter.clone());
        ledger
            .mint(&minter, &alice, &set(&[("1", 10), ("2", 5)]))
            .await
            .unwrap();
        (ledger, minter, alice, ItemId::parse("77").unwrap())
    }

    #[test]
    fn storage_keys() {
        assert_eq!(
            BalanceKey::account(&account("alice.near"), &unit("1")).to_string(),
            "alice.near:1"
        );
        assert_eq!(
            BalanceKey::item(&ItemId::parse("77").unwrap(), &unit("1")).to_string(),
            "nft:77:1"
        );
    }

    #[tokio::test]
    async fn mint_increases_balance_and_supply() {
        let (ledger, _, alice, _) = funded().await;
        assert_eq!(ledger.balance_of(&alice, &unit("1")).await, Amount::new(10));
        assert_eq!(ledger.supply_of(&unit("2")).await, Amount::new(5));
        assert_eq!(ledger.supply_of(&unit("3")).await, Amount::ZERO);
    }

    #[tokio::test]
    async fn swap_locks_then_unlocks() {
        let (ledger, minter, alice, item) = funded().await;

        ledger
            .swap_balances(&minter, &item, &alice, &set(&[("1", 10)]), &BalanceSet::empty())
            .await
            .unwrap();
        assert_eq!(ledger.balance_of(&alice, &unit("1")).await, Amount::ZERO);
        assert_eq!(
            ledger.locked_balance_of(&item, &unit("1")).await,
            Amount::new(10)
        );

        // Unlocks see the locks applied earlier in the same call.
        ledger
            .swap_balances(&minter, &item, &alice, &set(&[("2", 5)]), &set(&[("2", 5), ("1", 4)]))
            .await
            .unwrap();
        assert_eq!(ledger.balance_of(&alice, &unit("2")).await, Amount::new(5));
        assert_eq!(ledger.balance_of(&alice, &unit("1")).await, Amount::new(4));
        assert_eq!(ledger.swap_count(), 2);
    }

    #[tokio::test]
    async fn insufficient_entry_applies_nothing() {
        let (ledger, minter, alice, item) = funded().await;
        let before = ledger.snapshot();

        let err = ledger
            .swap_balances(&minter, &item, &alice, &set(&[("1", 3), ("2", 6)]), &BalanceSet::empty())
            .await
            .unwrap_err();

        assert!(matches!(err, SagaError::LedgerRejected(ref msg) if msg == "Insufficient balance"));
        assert_eq!(ledger.snapshot(), before);
        assert_eq!(ledger.swap_count(), 0);
    }

    #[tokio::test]
    async fn non_minter_cannot_swap_or_mint() {
        let (ledger, _, alice, item) = funded().await;
        let before = ledger.snapshot();

        assert!(
            ledger
                .swap_balances(&alice, &item, &alice, &set(&[("1", 1)]), &BalanceSet::empty())
                .await
                .is_err()
        );
        assert!(ledger.mint(&alice, &alice, &set(&[("1", 1)])).await.is_err());
        assert_eq!(ledger.snapshot(), before);
    }

    #[tokio::test]
    async fn injected_outage_after_n_swaps() {
        let (ledger, minter, alice, item) = funded().await;
        ledger.fail_swaps_after(1);

        ledger
            .swap_balances(&minter, &item, &alice, &set(&[("1", 1)]), &BalanceSet::empty())
            .await
            .unwrap();
        let err = ledger
            .swap_balances(&minter, &item, &alice, &BalanceSet::empty(), &set(&[("1", 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, SagaError::LedgerRejected(_)));
        assert_eq!(
            ledger.locked_balance_of(&item, &unit("1")).await,
            Amount::new(1)
        );
    }

    #[tokio::test]
    async fn fail_on_swap_toggles() {
        let (ledger, minter, alice, item) = funded().await;
        ledger.set_fail_on_swap(true);
        assert!(
            ledger
                .swap_balances(&minter, &item, &alice, &BalanceSet::empty(), &BalanceSet::empty())
                .await
                .is_err()
        );
        ledger.set_fail_on_swap(false);
        assert!(
            ledger
                .swap_balances(&minter, &item, &alice, &BalanceSet::empty(), &BalanceSet::empty())
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn transfer_moves_from_caller() {
        let minter = account("composition.near");
        let bob = account("bob.near");
        let ledger = InMemoryBalanceLedger::with_minter(minter.clone());
        ledger.mint(&minter, &minter, &set(&[("1", 3)])).await.unwrap();

        ledger
            .transfer(&minter, &bob, &unit("1"), Amount::new(2))
            .await
            .unwrap();
        assert_eq!(ledger.balance_of(&bob, &unit("1")).await, Amount::new(2));
        assert_eq!(ledger.balance_of(&minter, &unit("1")).await, Amount::new(1));

        assert!(
            ledger
                .transfer(&minter, &bob, &unit("1"), Amount::new(2))
                .await
                .is_err()
        );
    }
}
