//! Accessory composition saga constants.

/// The saga type identifier.
pub const SAGA_TYPE: &str = "AccessoryComposition";

/// Step name: lock and unlock units against the item in one ledger call.
pub const STEP_SWAP_BALANCES: &str = "swap_balances";

/// Step name: replace the item's metadata.
pub const STEP_REPLACE_METADATA: &str = "replace_metadata";

/// Step name: the compensating swap with lock and unlock roles exchanged.
pub const STEP_ROLLBACK_BALANCES: &str = "rollback_balances";

/// Record metadata key correlating a saga's records with its item.
pub const ITEM_ID_KEY: &str = "item_id";

/// Record metadata key holding the saga type.
pub const SAGA_TYPE_KEY: &str = "saga_type";
