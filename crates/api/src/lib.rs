//! HTTP dashboard and order API for the pizza order saga.
//!
//! Customers place orders, dispatchers watch the orders waiting for a driver
//! (with a live count pushed over server-sent events) and assign drivers.
//! Structured logging via tracing and Prometheus metrics throughout.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::ReferenceData;
use journal::Journal;
use metrics_exporter_prometheus::PrometheusHandle;
use projections::{LiveCountFeed, OrderFilter, OrderIndex, ProjectionProcessor};
use saga::{
    FaultInjector, InMemoryCustomerDirectory, InMemoryMenuService, SagaCoordinator, StepPolicies,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use dashboard::Dashboard;
use error::ApiError;

/// The saga coordinator as the server runs it, over simulated remote services.
pub type Coordinator<J> = SagaCoordinator<J, InMemoryMenuService, InMemoryCustomerDirectory>;

/// Shared application state accessible from all handlers.
pub struct AppState<J: Journal> {
    pub coordinator: Coordinator<J>,
    pub dashboard: Dashboard<J>,
    pub reference: ReferenceData,
    pub page_size: usize,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<J: Journal + Clone + 'static>(
    state: Arc<AppState<J>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<J>))
        .route("/menu", get(routes::reference::menu::<J>))
        .route("/drivers", get(routes::reference::drivers::<J>))
        .route("/orders", post(routes::orders::create::<J>))
        .route("/orders", get(routes::orders::list::<J>))
        .route("/orders/count", get(routes::orders::count::<J>))
        .route("/orders/count.stream", get(routes::orders::count_stream::<J>))
        .route("/orders/{id}", get(routes::orders::get::<J>))
        .route("/orders/{id}/events", get(routes::orders::events::<J>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<J>))
        .route("/assign", post(routes::orders::assign::<J>))
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

/// Builds the application state over `journal` with simulated remote services.
pub fn create_default_state<J: Journal + Clone + 'static>(
    journal: J,
    config: &Config,
) -> Arc<AppState<J>> {
    let reference = ReferenceData::standard();

    let faults = if config.fault_rate > 0.0 {
        FaultInjector::random(config.fault_rate)
    } else {
        FaultInjector::never()
    };
    let menu = InMemoryMenuService::new(Arc::clone(&reference.catalog))
        .with_faults(faults.clone())
        .with_latency(config.remote_latency);
    let directory = InMemoryCustomerDirectory::new(Arc::clone(&reference.directory))
        .with_faults(faults)
        .with_latency(config.remote_latency);

    let index = OrderIndex::new();
    let coordinator = SagaCoordinator::new(
        journal,
        menu,
        directory,
        index.clone(),
        StepPolicies::default(),
    );

    let feed = LiveCountFeed::new(
        index.counter(OrderFilter::unassigned()),
        config.count_poll_interval,
    );
    let dashboard = Dashboard::new(coordinator.clone(), feed, Arc::clone(&reference.roster));

    Arc::new(AppState {
        coordinator,
        dashboard,
        reference,
        page_size: config.page_size,
    })
}

/// Rebuilds the order index from the journal and restarts every unfinished
/// saga. Returns how many sagas were restarted.
#[tracing::instrument(skip(state))]
pub async fn recover<J: Journal + Clone + 'static>(state: &AppState<J>) -> Result<usize, ApiError> {
    let mut processor = ProjectionProcessor::new(state.coordinator.journal().clone());
    processor.register(Box::new(state.coordinator.index().clone()));
    processor.rebuild_all().await?;

    let resumed = state.coordinator.resume_pending().await?;
    tracing::info!(
        indexed = state.coordinator.index().len().await,
        resumed = resumed.len(),
        "recovered from journal"
    );
    Ok(resumed.len())
}
