//! Menu and driver roster endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use domain::{Driver, MenuItem};
use journal::Journal;

use crate::AppState;
use crate::error::ApiError;

/// GET /menu: the menu as the remote menu service reports it.
#[tracing::instrument(skip(state))]
pub async fn menu<J: Journal + Clone + 'static>(
    State(state): State<Arc<AppState<J>>>,
) -> Result<Json<Vec<MenuItem>>, ApiError> {
    Ok(Json(state.coordinator.get_menu().await?))
}

/// GET /drivers: the drivers the dashboard can assign.
pub async fn drivers<J: Journal + Clone + 'static>(
    State(state): State<Arc<AppState<J>>>,
) -> Json<Vec<Driver>> {
    Json(state.dashboard.roster().drivers().to_vec())
}
