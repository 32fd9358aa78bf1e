//! Views of the collaborators, plus minting of units and items.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::{AccountId, BalanceSet, ItemId, TokenMetadata, UnitId, WireAmount};
use event_store::EventStore;
use saga::{BalanceLedger, MetadataStore};
use serde::{Deserialize, Serialize};

use super::sagas::AppState;
use crate::caller::Caller;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct BalanceResponse {
    pub holder: String,
    pub unit_id: String,
    /// Decimal string; amounts can exceed what JSON numbers carry exactly.
    pub balance: String,
}

#[derive(Deserialize)]
pub struct MintBody {
    pub owner: String,
    pub token_ids: Vec<String>,
    pub amounts: Vec<WireAmount>,
}

#[derive(Deserialize)]
pub struct MintItemBody {
    pub item_id: String,
    pub metadata: TokenMetadata,
    /// Locked items refuse metadata updates.
    #[serde(default)]
    pub locked: bool,
}

/// GET /ledger/{account_id}/{unit_id}
#[tracing::instrument(skip(state))]
pub async fn balance<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((account_id, unit_id)): Path<(String, String)>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let account = AccountId::parse(account_id)?;
    let unit = UnitId::parse(unit_id)?;
    let balance = state.coordinator.ledger().balance_of(&account, &unit).await;

    Ok(Json(BalanceResponse {
        holder: account.to_string(),
        unit_id: unit.to_string(),
        balance: balance.to_string(),
    }))
}

/// GET /items/{item_id}/locked/{unit_id}
#[tracing::instrument(skip(state))]
pub async fn locked<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((item_id, unit_id)): Path<(String, String)>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let item = ItemId::parse(item_id)?;
    let unit = UnitId::parse(unit_id)?;
    let balance = state
        .coordinator
        .ledger()
        .locked_balance_of(&item, &unit)
        .await;

    Ok(Json(BalanceResponse {
        holder: format!("nft:{item}"),
        unit_id: unit.to_string(),
        balance: balance.to_string(),
    }))
}

/// GET /items/{item_id}/metadata
#[tracing::instrument(skip(state))]
pub async fn metadata<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(item_id): Path<String>,
) -> Result<Json<TokenMetadata>, ApiError> {
    let item = ItemId::parse(item_id)?;
    state
        .coordinator
        .metadata()
        .metadata_of(&item)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Item {item} not found")))
}

/// POST /ledger/mint
#[tracing::instrument(skip(state, body), fields(caller = %caller, owner = %body.owner))]
pub async fn mint<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(caller): Caller,
    Json(body): Json<MintBody>,
) -> Result<StatusCode, ApiError> {
    let owner = AccountId::parse(body.owner)?;
    let set = BalanceSet::from_parallel(
        "mint",
        body.token_ids.as_slice(),
        body.amounts.as_slice(),
    )?;

    state.coordinator.ledger().mint(&caller, &owner, &set).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /items
///
/// Registers an item with its initial metadata. Only minters may call this.
#[tracing::instrument(skip(state, body), fields(caller = %caller, item_id = %body.item_id))]
pub async fn mint_item<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(caller): Caller,
    Json(body): Json<MintItemBody>,
) -> Result<StatusCode, ApiError> {
    let item = ItemId::parse(body.item_id)?;
    state
        .coordinator
        .metadata()
        .mint_item(&caller, item, body.metadata, body.locked)?;
    Ok(StatusCode::CREATED)
}
