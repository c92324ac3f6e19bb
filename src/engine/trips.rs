use chrono::Utc;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::lifecycle::{ensure_driver, transition};
use crate::engine::notify::order_status_changed;
use crate::error::AppError;
use crate::geo::{haversine_km, validate_point};
use crate::models::driver::GeoPoint;
use crate::models::notification::RealtimeEvent;
use crate::models::order::{Order, OrderStatus};
use crate::models::trip::ActiveTrip;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct TripView {
    pub trip: ActiveTrip,
    pub order: Order,
}

/// Starts a delivery: the driver's slot is reserved first so two concurrent
/// starts for the same driver cannot both succeed.
pub fn start_trip(
    state: &AppState,
    driver_id: Uuid,
    order_id: Uuid,
    location: GeoPoint,
) -> Result<ActiveTrip, AppError> {
    validate_point(&location)?;

    if !state.drivers.contains_key(&driver_id) {
        return Err(AppError::NotFound(format!("driver {driver_id} not found")));
    }

    match state.driver_trips.entry(driver_id) {
        Entry::Occupied(_) => {
            state
                .metrics
                .transition_rejections_total
                .with_label_values(&[AppError::ActiveTripExists.code()])
                .inc();
            warn!(driver_id = %driver_id, order_id = %order_id, "driver already has an active trip");
            return Err(AppError::ActiveTripExists);
        }
        Entry::Vacant(slot) => {
            slot.insert(order_id);
        }
    }

    let result = begin_trip(state, driver_id, order_id, location);
    if result.is_err() {
        state
            .driver_trips
            .remove_if(&driver_id, |_, held| *held == order_id);
    }
    result
}

fn begin_trip(
    state: &AppState,
    driver_id: Uuid,
    order_id: Uuid,
    location: GeoPoint,
) -> Result<ActiveTrip, AppError> {
    let order_number = {
        let order = state
            .orders
            .get(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
        ensure_driver(order.value(), driver_id)?;
        order.order_number.clone()
    };

    let now = Utc::now();
    let trip = ActiveTrip {
        order_id,
        driver_id,
        latitude: location.lat,
        longitude: location.lng,
        order_number,
        update_count: 0,
        distance_km: 0.0,
        started_at: now,
        updated_at: now,
    };

    match state.trips.entry(order_id) {
        Entry::Occupied(_) => {
            return Err(AppError::Conflict(format!(
                "order {order_id} already has an active trip"
            )));
        }
        Entry::Vacant(slot) => {
            slot.insert(trip.clone());
        }
    }
    state.metrics.active_trips.inc();

    match transition(
        state,
        order_id,
        OrderStatus::InTransit,
        |order| ensure_driver(order, driver_id),
        |_| {},
    ) {
        Ok((order, from)) => {
            info!(
                driver_id = %driver_id,
                order_id = %order_id,
                order_number = %order.order_number,
                "trip started"
            );
            order_status_changed(state, &order, from);
            Ok(trip)
        }
        Err(err) => {
            if state.trips.remove(&order_id).is_some() {
                state.metrics.active_trips.dec();
            }
            Err(err)
        }
    }
}

/// Drops the trip row of an order and frees its driver. No-op without a trip.
pub fn release_trip(state: &AppState, order_id: Uuid) {
    if let Some((_, trip)) = state.trips.remove(&order_id) {
        state.metrics.active_trips.dec();
        state
            .driver_trips
            .remove_if(&trip.driver_id, |_, held| *held == order_id);
        info!(
            driver_id = %trip.driver_id,
            order_id = %order_id,
            updates = trip.update_count,
            distance_km = trip.distance_km,
            "trip closed"
        );
    }
}

fn current_order_id(state: &AppState, driver_id: Uuid) -> Result<Uuid, AppError> {
    state
        .driver_trips
        .get(&driver_id)
        .map(|entry| *entry.value())
        .ok_or(AppError::NoActiveTrip)
}

/// Returns the driver's in-progress trip so a driver app can pick it back up.
pub fn resume_trip(state: &AppState, driver_id: Uuid) -> Result<TripView, AppError> {
    let order_id = current_order_id(state, driver_id)?;
    let trip = state
        .trips
        .get(&order_id)
        .map(|entry| entry.value().clone())
        .ok_or(AppError::NoActiveTrip)?;
    let order = state
        .orders
        .get(&order_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    Ok(TripView { trip, order })
}

/// Overwrites the trip position and bumps its refresh counter.
pub fn update_location(
    state: &AppState,
    driver_id: Uuid,
    location: GeoPoint,
) -> Result<ActiveTrip, AppError> {
    validate_point(&location)?;
    let order_id = current_order_id(state, driver_id)?;

    let trip = {
        let mut trip = state
            .trips
            .get_mut(&order_id)
            .ok_or(AppError::NoActiveTrip)?;

        let travelled = haversine_km(&trip.location(), &location);
        trip.latitude = location.lat;
        trip.longitude = location.lng;
        trip.distance_km += travelled;
        trip.update_count += 1;
        trip.updated_at = Utc::now();
        trip.clone()
    };

    let _ = state.realtime_tx.send(RealtimeEvent::TripLocation {
        order_id: trip.order_id,
        driver_id,
        latitude: trip.latitude,
        longitude: trip.longitude,
        update_count: trip.update_count,
        at: trip.updated_at,
    });

    Ok(trip)
}

/// Marks the driver's current order DELIVERED and removes the trip row.
pub fn deliver(state: &AppState, driver_id: Uuid) -> Result<Order, AppError> {
    let order_id = current_order_id(state, driver_id)?;

    let (order, from) = transition(
        state,
        order_id,
        OrderStatus::Delivered,
        |order| ensure_driver(order, driver_id),
        |_| {},
    )?;

    release_trip(state, order_id);
    info!(driver_id = %driver_id, order_id = %order_id, "order delivered");
    order_status_changed(state, &order, from);
    Ok(order)
}

/// Pushes an IN_TRANSIT order back to ASSIGNED. This bypasses the adjacency
/// table on purpose: it is the driver's undo for a trip started by mistake.
pub fn revert_trip(state: &AppState, driver_id: Uuid, order_id: Uuid) -> Result<Order, AppError> {
    let order = {
        let mut order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        ensure_driver(order.value(), driver_id)?;
        if order.status != OrderStatus::InTransit {
            return Err(AppError::InvalidStatusTransition {
                from: order.status,
                to: OrderStatus::Assigned,
            });
        }

        order.status = OrderStatus::Assigned;
        order.updated_at = Utc::now();
        order.clone()
    };

    state
        .metrics
        .order_transitions_total
        .with_label_values(&[OrderStatus::InTransit.as_str(), OrderStatus::Assigned.as_str()])
        .inc();
    release_trip(state, order_id);
    info!(driver_id = %driver_id, order_id = %order_id, "trip reverted");
    order_status_changed(state, &order, OrderStatus::InTransit);
    Ok(order)
}

pub fn list_active_trips(state: &AppState) -> Vec<ActiveTrip> {
    let mut trips: Vec<ActiveTrip> = state
        .trips
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    trips.sort_by_key(|trip| trip.started_at);
    trips
}
