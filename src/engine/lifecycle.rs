use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::notify::{notify, order_status_changed};
use crate::engine::trips::release_trip;
use crate::error::AppError;
use crate::models::notification::{Notification, NotificationKind};
use crate::models::order::{Order, OrderStatus};
use crate::state::AppState;

/// Who asked for a cancellation. Drivers may only cancel their own orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelActor {
    Admin,
    Driver(Uuid),
}

/// The transition guard: adjacency table plus the driver requirement for IN_TRANSIT.
pub fn check_transition(order: &Order, target: OrderStatus) -> Result<(), AppError> {
    if !order.status.can_transition_to(target) {
        return Err(AppError::InvalidStatusTransition {
            from: order.status,
            to: target,
        });
    }

    if target == OrderStatus::InTransit && order.driver_id.is_none() {
        return Err(AppError::NoDriverAssigned);
    }

    Ok(())
}

pub fn ensure_driver(order: &Order, driver_id: Uuid) -> Result<(), AppError> {
    if order.driver_id == Some(driver_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "order {} is not assigned to driver {driver_id}",
            order.order_number
        )))
    }
}

/// Applies a guarded transition while holding the order's entry lock.
///
/// `check` runs before the guard and may reject the change; `apply` runs only
/// once every check passed. Returns the updated order and its previous status.
/// Notification is left to the caller so it happens after the lock is released.
pub(crate) fn transition<C, A>(
    state: &AppState,
    order_id: Uuid,
    target: OrderStatus,
    check: C,
    apply: A,
) -> Result<(Order, OrderStatus), AppError>
where
    C: FnOnce(&Order) -> Result<(), AppError>,
    A: FnOnce(&mut Order),
{
    let result = {
        let mut order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        check(order.value())
            .and_then(|()| check_transition(order.value(), target))
            .map(|()| {
                let from = order.status;
                apply(order.value_mut());
                order.status = target;
                order.updated_at = Utc::now();
                (order.clone(), from)
            })
    };

    match &result {
        Ok((order, from)) => {
            state
                .metrics
                .order_transitions_total
                .with_label_values(&[from.as_str(), target.as_str()])
                .inc();
            info!(
                order_id = %order.id,
                order_number = %order.order_number,
                from = %from,
                to = %target,
                "order status updated"
            );
        }
        Err(err) => {
            state
                .metrics
                .transition_rejections_total
                .with_label_values(&[err.code()])
                .inc();
            warn!(order_id = %order_id, to = %target, error = %err, "order status change rejected");
        }
    }

    result
}

fn normalize_reason(reason: Option<String>) -> Option<String> {
    reason
        .map(|reason| reason.trim().to_string())
        .filter(|reason| !reason.is_empty())
}

/// Moves an order to `new_status` if the guard allows it, then notifies.
///
/// IN_TRANSIT is only reachable through `trips::start_trip`, which owns the
/// ActiveTrip row for the order.
pub fn update_order_status(
    state: &AppState,
    order_id: Uuid,
    new_status: OrderStatus,
    reason: Option<String>,
) -> Result<Order, AppError> {
    if new_status == OrderStatus::InTransit {
        let err = AppError::UseStartTrip;
        state
            .metrics
            .transition_rejections_total
            .with_label_values(&[err.code()])
            .inc();
        warn!(order_id = %order_id, to = %new_status, error = %err, "order status change rejected");
        return Err(err);
    }

    let reason = normalize_reason(reason);
    let (order, from) = transition(
        state,
        order_id,
        new_status,
        |_| Ok(()),
        |order| {
            if new_status == OrderStatus::Canceled {
                order.reason_of_cancel = reason;
            }
        },
    )?;

    if order.status.is_terminal() {
        release_trip(state, order.id);
    }

    order_status_changed(state, &order, from);
    Ok(order)
}

/// Assigns an active driver. A PENDING order moves to ASSIGNED; an ASSIGNED
/// order keeps its status and swaps drivers.
pub fn assign_driver(state: &AppState, order_id: Uuid, driver_id: Uuid) -> Result<Order, AppError> {
    let driver_active = state
        .drivers
        .get(&driver_id)
        .map(|driver| driver.active)
        .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

    if !driver_active {
        return Err(AppError::BadRequest(format!(
            "driver {driver_id} is not active"
        )));
    }

    let reassigned = {
        let mut order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        if order.status == OrderStatus::Assigned {
            let previous = order.driver_id.replace(driver_id);
            order.updated_at = Utc::now();
            Some((order.clone(), previous))
        } else {
            None
        }
    };

    if let Some((order, previous)) = reassigned {
        if previous != Some(driver_id) {
            info!(
                order_id = %order.id,
                driver_id = %driver_id,
                previous_driver_id = ?previous,
                "order reassigned"
            );
            if let Some(previous) = previous {
                notify(
                    state,
                    Notification::new(
                        previous,
                        order.id,
                        NotificationKind::OrderReassigned,
                        "Delivery reassigned",
                        format!("Order {} was reassigned to another driver", order.order_number),
                    ),
                );
            }
            order_status_changed(state, &order, OrderStatus::Assigned);
        }
        return Ok(order);
    }

    let (order, from) = transition(
        state,
        order_id,
        OrderStatus::Assigned,
        |_| Ok(()),
        |order| order.driver_id = Some(driver_id),
    )?;

    order_status_changed(state, &order, from);
    Ok(order)
}

/// Cancels an order from any non-terminal status and releases its trip.
pub fn cancel_order(
    state: &AppState,
    order_id: Uuid,
    reason: Option<String>,
    actor: CancelActor,
) -> Result<Order, AppError> {
    let reason = normalize_reason(reason);
    let (order, from) = transition(
        state,
        order_id,
        OrderStatus::Canceled,
        |order| match actor {
            CancelActor::Admin => Ok(()),
            CancelActor::Driver(driver_id) => ensure_driver(order, driver_id),
        },
        |order| order.reason_of_cancel = reason,
    )?;

    release_trip(state, order.id);
    order_status_changed(state, &order, from);
    Ok(order)
}
