use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::checkout::{self, CheckoutRequest};
use crate::engine::lifecycle::{self, CancelActor};
use crate::engine::trips;
use crate::error::AppError;
use crate::models::order::{Order, OrderStatus};
use crate::models::trip::ActiveTrip;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/checkout", post(checkout_cart))
        .route("/orders", get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", patch(update_status))
        .route("/orders/:id/assign", post(assign_driver))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/trips", get(list_trips))
}

#[derive(Deserialize, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub driver_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct AssignDriverRequest {
    pub driver_id: Uuid,
}

#[derive(Deserialize, Default)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

async fn checkout_cart(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<Order>, AppError> {
    checkout::checkout(&state, payload).map(Json)
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<OrderFilter>,
) -> Json<Vec<Order>> {
    let mut orders: Vec<Order> = state
        .orders
        .iter()
        .map(|entry| entry.value().clone())
        .filter(|order| filter.status.is_none_or(|status| order.status == status))
        .filter(|order| filter.driver_id.is_none_or(|id| order.driver_id == Some(id)))
        .filter(|order| filter.customer_id.is_none_or(|id| order.customer_id == id))
        .collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(orders)
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("order {} not found", id)))?;

    Ok(Json(order.value().clone()))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, AppError> {
    lifecycle::update_order_status(&state, id, payload.status, payload.reason).map(Json)
}

async fn assign_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignDriverRequest>,
) -> Result<Json<Order>, AppError> {
    lifecycle::assign_driver(&state, id, payload.driver_id).map(Json)
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<CancelRequest>>,
) -> Result<Json<Order>, AppError> {
    let payload = payload.map(|Json(payload)| payload).unwrap_or_default();
    lifecycle::cancel_order(&state, id, payload.reason, CancelActor::Admin).map(Json)
}

async fn list_trips(State(state): State<Arc<AppState>>) -> Json<Vec<ActiveTrip>> {
    Json(trips::list_active_trips(&state))
}
