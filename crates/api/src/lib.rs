//! HTTP surface for the accessory composition saga.
//!
//! Starts sagas, reports their status and records, exposes the collaborators'
//! views and the oracle administration surface, with structured logging
//! (tracing) and Prometheus metrics.

pub mod caller;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use projections::{ItemHistoryView, Projection, ProjectionProcessor, UnresolvedOperationsView};
use saga::{InMemoryBalanceLedger, InMemoryMetadataStore, OracleRegistry, SagaCoordinator};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::sagas::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/items", post(routes::ledger::mint_item::<S>))
        .route("/items/{item_id}/compose", post(routes::sagas::compose::<S>))
        .route("/items/{item_id}/history", get(routes::sagas::item_history::<S>))
        .route("/items/{item_id}/records", get(routes::sagas::item_records::<S>))
        .route("/items/{item_id}/metadata", get(routes::ledger::metadata::<S>))
        .route(
            "/items/{item_id}/locked/{unit_id}",
            get(routes::ledger::locked::<S>),
        )
        .route("/sagas/{id}", get(routes::sagas::status::<S>))
        .route("/sagas/{id}/records", get(routes::sagas::records::<S>))
        .route("/unresolved", get(routes::sagas::unresolved::<S>))
        .route("/ledger/mint", post(routes::ledger::mint::<S>))
        .route(
            "/ledger/{account_id}/{unit_id}",
            get(routes::ledger::balance::<S>),
        )
        .route("/oracles", post(routes::oracles::add::<S>))
        .route("/oracles/revoke", post(routes::oracles::revoke::<S>))
        .route("/oracles/{account_id}", get(routes::oracles::get::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the coordinator to in-memory collaborators and registers the
/// projections. The orchestrator is authorized on both collaborators.
pub fn create_default_state<S: EventStore + Clone + 'static>(
    event_store: S,
    config: &Config,
) -> Arc<AppState<S>> {
    let ledger = InMemoryBalanceLedger::with_minter(config.orchestrator.clone());
    let metadata = InMemoryMetadataStore::with_minter(config.orchestrator.clone());
    let coordinator = SagaCoordinator::new(
        event_store.clone(),
        ledger,
        metadata,
        OracleRegistry::new(config.owner.clone()),
        config.orchestrator.clone(),
        config.hop_costs,
    );

    let unresolved = UnresolvedOperationsView::new();
    let item_history = ItemHistoryView::new();
    let mut processor = ProjectionProcessor::new(event_store.clone());
    processor.register(Box::new(unresolved.clone()) as Box<dyn Projection>);
    processor.register(Box::new(item_history.clone()) as Box<dyn Projection>);

    Arc::new(AppState {
        coordinator: Arc::new(coordinator),
        event_store,
        projection_processor: Arc::new(processor),
        unresolved,
        item_history,
    })
}
