//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use journal::Journal;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub awaiting_driver: u64,
    pub count_subscribers: usize,
}

/// GET /health: liveness plus the dashboard's headline numbers.
pub async fn check<J: Journal + Clone + 'static>(
    State(state): State<Arc<AppState<J>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        awaiting_driver: state.dashboard.count(true).await,
        count_subscribers: state.dashboard.feed().subscriber_count(),
    })
}
