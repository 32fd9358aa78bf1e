//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use event_store::EventStore;
use serde::Serialize;

use super::sagas::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub orchestrator: String,
    /// Calls queued but not yet delivered.
    pub pending_calls: usize,
}

/// GET /health
pub async fn check<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        orchestrator: state.coordinator.orchestrator().to_string(),
        pending_calls: state.coordinator.pending(),
    })
}
