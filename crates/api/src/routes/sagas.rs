//! Saga start, status and record endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::AggregateId;
use domain::{Aggregate, BalanceSet, ComposeRequest, ItemId, TokenMetadata, WireAmount};
use event_store::{EventEnvelope, EventQuery, EventStore};
use projections::{ItemHistoryView, ProjectionProcessor, UnresolvedOperationsView};
use saga::composition::ITEM_ID_KEY;
use saga::{
    Gas, InMemoryBalanceLedger, InMemoryMetadataStore, SagaCoordinator, SagaError, SagaRecord,
    SagaState,
};
use serde::{Deserialize, Serialize};

use crate::caller::Caller;
use crate::error::ApiError;

pub type Coordinator<S> = SagaCoordinator<S, InMemoryBalanceLedger, InMemoryMetadataStore>;

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore> {
    pub coordinator: Arc<Coordinator<S>>,
    pub event_store: S,
    pub projection_processor: Arc<ProjectionProcessor<S>>,
    pub unresolved: UnresolvedOperationsView,
    pub item_history: ItemHistoryView,
}

// -- Request types --

#[derive(Deserialize)]
pub struct ComposeBody {
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
    /// Defaults to the worst-case requirement.
    pub attached_gas: Option<u64>,
}

#[derive(Deserialize)]
pub struct PageParams {
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

// -- Response types --

#[derive(Serialize)]
pub struct ComposeResponse {
    pub saga_id: String,
    pub state: String,
    pub attached_gas: u64,
}

#[derive(Serialize)]
pub struct SagaStatusResponse {
    pub saga_id: String,
    pub saga_type: String,
    pub item_id: Option<String>,
    pub item_owner: Option<String>,
    pub caller: Option<String>,
    pub state: String,
    pub terminal: bool,
    pub completed_steps: Vec<String>,
    pub failure_reason: Option<String>,
    pub started_at: Option<String>,
    pub version: i64,
}

#[derive(Serialize)]
pub struct EventEnvelopeResponse {
    pub event_id: String,
    pub event_type: String,
    pub aggregate_id: String,
    pub version: i64,
    pub timestamp: String,
    pub payload: serde_json::Value,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize)]
pub struct UnresolvedResponse {
    pub saga_id: String,
    pub item_id: String,
    pub lock_set: BalanceSet,
    pub unlock_set: BalanceSet,
    pub metadata: TokenMetadata,
    pub error: String,
    pub recorded_at: String,
}

#[derive(Serialize)]
pub struct ItemHistoryResponse {
    pub item_id: String,
    pub sagas_started: usize,
    pub in_flight: usize,
    pub outcomes: Vec<ItemOutcomeResponse>,
}

#[derive(Serialize)]
pub struct ItemOutcomeResponse {
    pub saga_id: String,
    pub outcome: String,
    pub caller: Option<String>,
    pub detail: Option<String>,
    pub recorded_at: String,
}

// -- Handlers --

/// POST /items/{item_id}/compose
///
/// Returns 202 once the forward swap is queued; the outcome arrives later
/// as a terminal record.
#[tracing::instrument(skip(state, body), fields(caller = %caller))]
pub async fn compose<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(caller): Caller,
    Path(item_id): Path<String>,
    Json(body): Json<ComposeBody>,
) -> Result<(StatusCode, Json<ComposeResponse>), ApiError> {
    metrics::counter!("api_compose_requests_total").increment(1);

    let attached_gas = match body.attached_gas {
        Some(gas) => Gas::new(gas),
        None => state.coordinator.budget().required()?,
    };

    let request = ComposeRequest {
        item_id,
        item_owner: body.item_owner,
        lock_token_ids: body.lock_token_ids,
        lock_amounts: body.lock_amounts,
        unlock_token_ids: body.unlock_token_ids,
        unlock_amounts: body.unlock_amounts,
        metadata: body.metadata,
    };
    let saga_id = state
        .coordinator
        .start(&caller, request, attached_gas)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ComposeResponse {
            saga_id: saga_id.to_string(),
            state: SagaState::AwaitingMetadataResult.to_string(),
            attached_gas: attached_gas.as_u64(),
        }),
    ))
}

/// GET /sagas/{id}
#[tracing::instrument(skip(state))]
pub async fn status<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<SagaStatusResponse>, ApiError> {
    let saga_id = parse_aggregate_id(&id)?;
    let saga = state
        .coordinator
        .get_saga(saga_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Saga {id} not found")))?;

    Ok(Json(SagaStatusResponse {
        saga_id: saga_id.to_string(),
        saga_type: saga.saga_type().to_string(),
        item_id: saga.item_id().map(ToString::to_string),
        item_owner: saga.item_owner().map(ToString::to_string),
        caller: saga.caller().map(ToString::to_string),
        state: saga.state().to_string(),
        terminal: saga.is_terminal(),
        completed_steps: saga.completed_steps().to_vec(),
        failure_reason: saga.failure_reason().map(String::from),
        started_at: saga.started_at().map(|t| t.to_rfc3339()),
        version: saga.version().as_i64(),
    }))
}

/// GET /sagas/{id}/records
#[tracing::instrument(skip(state))]
pub async fn records<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<EventEnvelopeResponse>>, ApiError> {
    let saga_id = parse_aggregate_id(&id)?;
    let envelopes = state.coordinator.saga_records(saga_id).await?;
    if envelopes.is_empty() {
        return Err(ApiError::NotFound(format!("Saga {id} not found")));
    }

    Ok(Json(envelopes.into_iter().map(to_response).collect()))
}

/// GET /items/{item_id}/records?limit=&offset=
///
/// Every saga record touching one item, across sagas, in append order.
#[tracing::instrument(skip(state, page))]
pub async fn item_records<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(item_id): Path<String>,
    Query(page): Query<PageParams>,
) -> Result<Json<Vec<EventEnvelopeResponse>>, ApiError> {
    let item = ItemId::parse(item_id)?;

    let mut query = EventQuery::new()
        .aggregate_type(SagaRecord::aggregate_type())
        .metadata_eq(ITEM_ID_KEY, item.as_str())
        .offset(page.offset);
    if let Some(limit) = page.limit {
        query = query.limit(limit);
    }

    let envelopes = state
        .event_store
        .query_events(query)
        .await
        .map_err(SagaError::from)?;

    Ok(Json(envelopes.into_iter().map(to_response).collect()))
}

/// GET /unresolved
///
/// Sagas whose compensating swap failed, oldest first.
#[tracing::instrument(skip(state))]
pub async fn unresolved<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<UnresolvedResponse>>, ApiError> {
    state.projection_processor.run_catch_up().await?;

    let responses = state
        .unresolved
        .all()
        .await
        .into_iter()
        .map(|op| UnresolvedResponse {
            saga_id: op.saga_id.to_string(),
            item_id: op.item_id.to_string(),
            lock_set: op.lock_set,
            unlock_set: op.unlock_set,
            metadata: op.metadata,
            error: op.error,
            recorded_at: op.recorded_at.to_rfc3339(),
        })
        .collect();

    Ok(Json(responses))
}

/// GET /items/{item_id}/history
#[tracing::instrument(skip(state))]
pub async fn item_history<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(item_id): Path<String>,
) -> Result<Json<ItemHistoryResponse>, ApiError> {
    let item = ItemId::parse(item_id)?;
    state.projection_processor.run_catch_up().await?;

    let history = state
        .item_history
        .get_item(&item)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("No sagas recorded for item {item}")))?;

    Ok(Json(ItemHistoryResponse {
        item_id: history.item_id.to_string(),
        sagas_started: history.sagas_started,
        in_flight: history.in_flight(),
        outcomes: history
            .outcomes
            .into_iter()
            .map(|o| ItemOutcomeResponse {
                saga_id: o.saga_id.to_string(),
                outcome: o.outcome.to_string(),
                caller: o.caller.map(|c| c.to_string()),
                detail: o.detail,
                recorded_at: o.recorded_at.to_rfc3339(),
            })
            .collect(),
    }))
}

fn to_response(e: EventEnvelope) -> EventEnvelopeResponse {
    EventEnvelopeResponse {
        event_id: e.event_id.to_string(),
        event_type: e.event_type,
        aggregate_id: e.aggregate_id.to_string(),
        version: e.version.as_i64(),
        timestamp: e.timestamp.to_rfc3339(),
        payload: e.payload,
        metadata: e.metadata.into_iter().collect(),
    }
}

fn parse_aggregate_id(id: &str) -> Result<AggregateId, ApiError> {
    AggregateId::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}
