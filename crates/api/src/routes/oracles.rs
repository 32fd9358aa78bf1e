//! Oracle administration.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use domain::AccountId;
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use super::sagas::AppState;
use crate::caller::Caller;
use crate::error::ApiError;

/// The caller must be the owner.
#[derive(Deserialize)]
pub struct OracleBody {
    pub account_id: String,
}

#[derive(Serialize)]
pub struct OracleResponse {
    pub account_id: String,
    pub is_oracle: bool,
}

/// POST /oracles
#[tracing::instrument(skip(state, body), fields(sender = %sender))]
pub async fn add<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(sender): Caller,
    Json(body): Json<OracleBody>,
) -> Result<Json<OracleResponse>, ApiError> {
    let account = state
        .coordinator
        .oracles()
        .add_oracle(&sender, &body.account_id)?;

    Ok(Json(OracleResponse {
        account_id: account.to_string(),
        is_oracle: true,
    }))
}

/// POST /oracles/revoke
#[tracing::instrument(skip(state, body), fields(sender = %sender))]
pub async fn revoke<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(sender): Caller,
    Json(body): Json<OracleBody>,
) -> Result<Json<OracleResponse>, ApiError> {
    let account = state
        .coordinator
        .oracles()
        .remove_oracle(&sender, &body.account_id)?;

    Ok(Json(OracleResponse {
        account_id: account.to_string(),
        is_oracle: false,
    }))
}

/// GET /oracles/{account_id}
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(account_id): Path<String>,
) -> Result<Json<OracleResponse>, ApiError> {
    let account = AccountId::parse(account_id)?;
    Ok(Json(OracleResponse {
        is_oracle: state.coordinator.oracles().is_oracle(&account),
        account_id: account.to_string(),
    }))
}
