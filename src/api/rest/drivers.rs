use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::lifecycle::{self, CancelActor};
use crate::engine::trips::{self, TripView};
use crate::error::AppError;
use crate::models::driver::{Driver, GeoPoint};
use crate::models::order::Order;
use crate::models::trip::ActiveTrip;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(create_driver).get(list_drivers))
        .route("/drivers/:id/active", patch(set_driver_active))
        .route("/drivers/:id/trip", get(resume_trip).post(start_trip))
        .route("/drivers/:id/trip/location", patch(update_location))
        .route("/drivers/:id/trip/deliver", post(deliver))
        .route("/drivers/:id/orders/:order_id/revert", post(revert_trip))
        .route("/drivers/:id/orders/:order_id/cancel", post(cancel_order))
}

#[derive(Deserialize)]
pub struct CreateDriverRequest {
    pub name: String,
    pub phone: String,
}

#[derive(Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

#[derive(Deserialize)]
pub struct StartTripRequest {
    pub order_id: Uuid,
    pub location: GeoPoint,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
}

#[derive(Deserialize, Default)]
pub struct DriverCancelRequest {
    pub reason: Option<String>,
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDriverRequest>,
) -> Result<Json<Driver>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    if payload.phone.trim().is_empty() {
        return Err(AppError::BadRequest("phone cannot be empty".to_string()));
    }

    let driver = Driver {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        phone: payload.phone.trim().to_string(),
        active: true,
        created_at: Utc::now(),
    };

    state.drivers.insert(driver.id, driver.clone());
    Ok(Json(driver))
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Json<Vec<Driver>> {
    let mut drivers: Vec<Driver> = state
        .drivers
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    drivers.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Json(drivers)
}

async fn set_driver_active(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetActiveRequest>,
) -> Result<Json<Driver>, AppError> {
    let mut driver = state
        .drivers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("driver {} not found", id)))?;

    driver.active = payload.active;

    Ok(Json(driver.clone()))
}

async fn resume_trip(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TripView>, AppError> {
    trips::resume_trip(&state, id).map(Json)
}

async fn start_trip(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StartTripRequest>,
) -> Result<Json<ActiveTrip>, AppError> {
    trips::start_trip(&state, id, payload.order_id, payload.location).map(Json)
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<ActiveTrip>, AppError> {
    trips::update_location(&state, id, payload.location).map(Json)
}

async fn deliver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    trips::deliver(&state, id).map(Json)
}

async fn revert_trip(
    State(state): State<Arc<AppState>>,
    Path((id, order_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Order>, AppError> {
    trips::revert_trip(&state, id, order_id).map(Json)
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path((id, order_id)): Path<(Uuid, Uuid)>,
    payload: Option<Json<DriverCancelRequest>>,
) -> Result<Json<Order>, AppError> {
    let payload = payload.map(|Json(payload)| payload).unwrap_or_default();
    lifecycle::cancel_order(&state, order_id, payload.reason, CancelActor::Driver(id)).map(Json)
}
