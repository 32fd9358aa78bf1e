use serde::{Deserialize, Serialize};

use super::{AccountId, BalanceSet, ItemError, ItemId, TokenMetadata, WireAmount};

/// A composition request as it arrives on the wire: identifiers and amounts
/// are unparsed strings and the balance sets are parallel arrays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeRequest {
    pub item_id: String,
    pub item_owner: String,
    #[serde(default)]
    pub lock_token_ids: Vec<String>,
    #[serde(default)]
    pub lock_amounts: Vec<WireAmount>,
    #[serde(default)]
    pub unlock_token_ids: Vec<String>,
    #[serde(default)]
    pub unlock_amounts: Vec<WireAmount>,
    pub metadata: TokenMetadata,
}

impl ComposeRequest {
    /// Parses every field, returning the first structural problem found.
    pub fn validate(self) -> Result<SagaRequest, ItemError> {
        let item_id = ItemId::parse(self.item_id)?;
        let item_owner = AccountId::parse(self.item_owner)?;
        let lock_set = BalanceSet::from_parallel(
            "lock",
            self.lock_token_ids.as_slice(),
            self.lock_amounts.as_slice(),
        )?;
        let unlock_set = BalanceSet::from_parallel(
            "unlock",
            self.unlock_token_ids.as_slice(),
            self.unlock_amounts.as_slice(),
        )?;

        Ok(SagaRequest {
            item_id,
            item_owner,
            lock_set,
            unlock_set,
            new_metadata: self.metadata,
        })
    }
}

/// A validated composition request.
///
/// Immutable for the life of a saga and carried verbatim into every
/// continuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaRequest {
    pub item_id: ItemId,
    /// Account whose free balances are locked against, or released from, the item.
    pub item_owner: AccountId,
    /// Moved from the owner onto the item.
    pub lock_set: BalanceSet,
    /// Moved from the item back to the owner.
    pub unlock_set: BalanceSet,
    pub new_metadata: TokenMetadata,
}

impl SagaRequest {
    pub fn new(
        item_id: ItemId,
        item_owner: AccountId,
        lock_set: BalanceSet,
        unlock_set: BalanceSet,
        new_metadata: TokenMetadata,
    ) -> Self {
        Self {
            item_id,
            item_owner,
            lock_set,
            unlock_set,
            new_metadata,
        }
    }

    /// The reversal of this request: lock and unlock roles exchanged, every
    /// amount kept exactly as submitted.
    pub fn swapped(&self) -> SagaRequest {
        SagaRequest {
            lock_set: self.unlock_set.clone(),
            unlock_set: self.lock_set.clone(),
            ..self.clone()
        }
    }
}
