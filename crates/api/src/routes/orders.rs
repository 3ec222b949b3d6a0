//! Order placement, dashboard listing and driver assignment endpoints.

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use chrono::{DateTime, Utc};
use common::{OrderId, RunId};
use domain::{FailureRecord, Order, OrderRequest, PlaceOrderResult};
use futures_util::{Stream, StreamExt};
use journal::Journal;
use projections::OrderIndexEntry;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

/// SSE event name carrying the number of orders waiting for a driver.
pub const COUNT_EVENT: &str = "count-changed";

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub customer_name: String,
    pub pizza_number: i32,
}

#[derive(Deserialize)]
pub struct ListParams {
    pub page_size: Option<usize>,
    #[serde(default)]
    pub all: bool,
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub order_id: String,
    pub driver: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Deserialize, Default)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderPlacedResponse {
    pub order_id: OrderId,
    pub run_id: RunId,
}

#[derive(Serialize)]
pub struct OrderListResponse {
    pub count: u64,
    pub orders: Vec<OrderIndexEntry>,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub run_id: Option<RunId>,
    pub state: String,
    pub customer_name: String,
    pub pizza_number: i32,
    pub pizza_name: Option<String>,
    pub customer_address: Option<String>,
    pub driver: Option<String>,
    pub result: Option<PlaceOrderResult>,
    pub failure: Option<FailureRecord>,
    pub cancel_reason: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl OrderResponse {
    fn from_order(order_id: OrderId, order: &Order) -> Self {
        Self {
            id: order_id.to_string(),
            run_id: order.run_id(),
            state: order.state().to_string(),
            customer_name: order.request().customer_name.clone(),
            pizza_number: order.request().pizza_number,
            pizza_name: order.item().map(|item| item.name.clone()),
            customer_address: order.customer().map(|c| c.address.clone()),
            driver: order.assignment().map(|a| a.label.clone()),
            result: order.result(),
            failure: order.failure().cloned(),
            cancel_reason: order.cancel_reason().map(String::from),
            updated_at: order.updated_at(),
        }
    }
}

#[derive(Serialize)]
pub struct EntryResponse {
    pub entry_id: String,
    pub entry_type: String,
    pub sequence: u64,
    pub recorded_at: String,
    pub payload: serde_json::Value,
}

// -- Handlers --

/// POST /orders: record a request and start its saga.
#[tracing::instrument(skip(state, req), fields(customer = %req.customer_name))]
pub async fn create<J: Journal + Clone + 'static>(
    State(state): State<Arc<AppState<J>>>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderPlacedResponse>), ApiError> {
    let handle = state
        .coordinator
        .submit(OrderRequest::new(req.customer_name, req.pizza_number))
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(OrderPlacedResponse {
            order_id: handle.order_id,
            run_id: handle.run_id,
        }),
    ))
}

/// GET /orders: the dashboard page, unassigned orders unless `all=true`.
pub async fn list<J: Journal + Clone + 'static>(
    State(state): State<Arc<AppState<J>>>,
    Query(params): Query<ListParams>,
) -> Json<OrderListResponse> {
    let page_size = params.page_size.unwrap_or(state.page_size);
    let (count, orders) = state.dashboard.list(!params.all, page_size).await;
    Json(OrderListResponse { count, orders })
}

/// GET /orders/count: orders waiting for a driver, as plain text.
pub async fn count<J: Journal + Clone + 'static>(
    State(state): State<Arc<AppState<J>>>,
) -> impl IntoResponse {
    let count = state.dashboard.count(true).await;
    ([(CONTENT_TYPE, "text/plain; charset=utf-8")], count.to_string())
}

/// GET /orders/count.stream: the waiting count, pushed whenever it changes.
pub async fn count_stream<J: Journal + Clone + 'static>(
    State(state): State<Arc<AppState<J>>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let counts = state.dashboard.subscribe_count().map(|count| {
        Ok(Event::default()
            .event(COUNT_EVENT)
            .data(count.to_string()))
    });
    Sse::new(counts).keep_alive(KeepAlive::default())
}

/// GET /orders/{id}: the order as its journal tells it.
#[tracing::instrument(skip(state))]
pub async fn get<J: Journal + Clone + 'static>(
    State(state): State<Arc<AppState<J>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state
        .coordinator
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(OrderResponse::from_order(order_id, &order)))
}

/// GET /orders/{id}/events: every journal entry for an order.
#[tracing::instrument(skip(state))]
pub async fn events<J: Journal + Clone + 'static>(
    State(state): State<Arc<AppState<J>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<EntryResponse>>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let entries = state.coordinator.history(order_id).await?;

    let responses = entries
        .into_iter()
        .map(|e| EntryResponse {
            entry_id: e.entry_id.to_string(),
            entry_type: e.entry_type,
            sequence: e.sequence.as_u64(),
            recorded_at: e.recorded_at.to_rfc3339(),
            payload: e.payload,
        })
        .collect();

    Ok(Json(responses))
}

/// POST /orders/{id}/cancel: cancel an unfinished order.
#[tracing::instrument(skip(state, body))]
pub async fn cancel<J: Journal + Clone + 'static>(
    State(state): State<Arc<AppState<J>>>,
    Path(id): Path<String>,
    body: Option<Json<CancelRequest>>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let reason = body
        .and_then(|Json(req)| req.reason)
        .unwrap_or_else(|| "cancelled by operator".to_string());

    let order = state.coordinator.cancel(order_id, reason).await?;
    Ok(Json(OrderResponse::from_order(order_id, &order)))
}

/// POST /assign: assign a driver to a waiting order.
#[tracing::instrument(skip(state, req), fields(driver = %req.driver))]
pub async fn assign<J: Journal + Clone + 'static>(
    State(state): State<Arc<AppState<J>>>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<PlaceOrderResult>, ApiError> {
    let order_id = parse_order_id(&req.order_id)?;
    let result = state
        .dashboard
        .assign(order_id, &req.driver, &req.note)
        .await?;
    Ok(Json(result))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid order ID: {e}")))
}
