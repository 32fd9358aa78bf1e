//! Metadata store trait and in-memory implementation.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use async_trait::async_trait;
use domain::{AccountId, ItemId, TokenMetadata};

use crate::error::SagaError;

/// Per-item descriptive records.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Replaces the item's record wholesale. On failure the stored record is
    /// unchanged.
    async fn replace_metadata(
        &self,
        caller: &AccountId,
        item_id: &ItemId,
        record: &TokenMetadata,
    ) -> Result<(), SagaError>;

    async fn metadata_of(&self, item_id: &ItemId) -> Option<TokenMetadata>;
}

#[derive(Debug, Clone, Default)]
struct StoredItem {
    metadata: TokenMetadata,
    locked: bool,
}

#[derive(Debug, Default)]
struct InMemoryMetadataState {
    items: HashMap<ItemId, StoredItem>,
    minters: BTreeSet<AccountId>,
    replacements: usize,
    fail_on_replace: bool,
}

/// In-memory metadata store for tests and the development server.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadataStore {
    state: Arc<RwLock<InMemoryMetadataState>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_minter(minter: AccountId) -> Self {
        let store = Self::new();
        store.add_minter(minter);
        store
    }

    pub fn add_minter(&self, minter: AccountId) {
        self.state().minters.insert(minter);
    }

    /// Registers an item with its initial record.
    pub fn insert_item(&self, item_id: ItemId, metadata: TokenMetadata) {
        self.state().items.insert(
            item_id,
            StoredItem {
                metadata,
                locked: false,
            },
        );
    }

    /// Mints a new item on behalf of `caller`, which must be a minter.
    pub fn mint_item(
        &self,
        caller: &AccountId,
        item_id: ItemId,
        metadata: TokenMetadata,
        locked: bool,
    ) -> Result<(), SagaError> {
        let mut state = self.state();
        if !state.minters.contains(caller) {
            return Err(SagaError::MetadataRejected(
                "Sender is not a minter".to_string(),
            ));
        }
        if state.items.contains_key(&item_id) {
            return Err(SagaError::MetadataRejected(format!(
                "Token {item_id} already exists"
            )));
        }

        tracing::debug!(item_id = %item_id, locked, "item minted");
        state.items.insert(item_id, StoredItem { metadata, locked });
        Ok(())
    }

    /// Locked items reject metadata updates.
    pub fn set_locked(&self, item_id: &ItemId, locked: bool) {
        if let Some(item) = self.state().items.get_mut(item_id) {
            item.locked = locked;
        }
    }

    pub fn set_fail_on_replace(&self, fail: bool) {
        self.state().fail_on_replace = fail;
    }

    /// Number of successful replacements.
    pub fn replace_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .replacements
    }

    fn state(&self) -> RwLockWriteGuard<'_, InMemoryMetadataState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn replace_metadata(
        &self,
        caller: &AccountId,
        item_id: &ItemId,
        record: &TokenMetadata,
    ) -> Result<(), SagaError> {
        let mut state = self.state();

        if !state.minters.contains(caller) {
            return Err(SagaError::MetadataRejected(
                "Only minters can update metadata".to_string(),
            ));
        }
        if state.fail_on_replace {
            return Err(SagaError::MetadataRejected(
                "Metadata store unavailable".to_string(),
            ));
        }

        let item = state
            .items
            .get_mut(item_id)
            .ok_or_else(|| SagaError::MetadataRejected(format!("Token {item_id} not found")))?;
        if item.locked {
            return Err(SagaError::MetadataRejected("Token is locked".to_string()));
        }

        item.metadata = record.clone();
        state.replacements += 1;
        Ok(())
    }

    async fn metadata_of(&self, item_id: &ItemId) -> Option<TokenMetadata> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .items
            .get(item_id)
            .map(|item| item.metadata.clone())
    }
}
