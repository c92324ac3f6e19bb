use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::notification::{Notification, NotificationKind, RealtimeEvent};
use crate::models::order::{Order, OrderStatus};
use crate::state::AppState;

/// Notifications kept per recipient; older entries are dropped first.
pub const INBOX_CAPACITY: usize = 200;

/// Queues a notification for the dispatcher. Never fails the caller.
pub fn notify(state: &AppState, notification: Notification) {
    match state.notification_tx.try_send(notification) {
        Ok(()) => {}
        Err(TrySendError::Full(dropped)) => {
            state.metrics.notifications_dropped_total.inc();
            warn!(order_id = %dropped.order_id, "notification queue full; dropping notification");
        }
        Err(TrySendError::Closed(dropped)) => {
            state.metrics.notifications_dropped_total.inc();
            warn!(order_id = %dropped.order_id, "notification queue closed; dropping notification");
        }
    }
}

/// Publishes the status change on the realtime feed and notifies the parties involved.
pub fn order_status_changed(state: &AppState, order: &Order, from: OrderStatus) {
    let _ = state.realtime_tx.send(RealtimeEvent::StatusChanged {
        order_id: order.id,
        order_number: order.order_number.clone(),
        from,
        to: order.status,
        driver_id: order.driver_id,
        at: order.updated_at,
    });

    for notification in status_notifications(order, from) {
        notify(state, notification);
    }
}

fn status_notifications(order: &Order, from: OrderStatus) -> Vec<Notification> {
    let number = &order.order_number;
    let customer = order.customer_id;

    match (from, order.status) {
        (OrderStatus::InTransit, OrderStatus::Assigned) => vec![Notification::new(
            customer,
            order.id,
            NotificationKind::OrderReverted,
            "Delivery delayed",
            format!("Order {number} is back with the driver and will leave shortly"),
        )],
        (_, OrderStatus::Pending) => vec![Notification::new(
            customer,
            order.id,
            NotificationKind::OrderPlaced,
            "Order placed",
            format!("We received order {number}"),
        )],
        (_, OrderStatus::Assigned) => {
            let mut out = vec![Notification::new(
                customer,
                order.id,
                NotificationKind::OrderAssigned,
                "Driver assigned",
                format!("A driver has been assigned to order {number}"),
            )];
            if let Some(driver_id) = order.driver_id {
                out.push(Notification::new(
                    driver_id,
                    order.id,
                    NotificationKind::OrderAssigned,
                    "New delivery",
                    format!("Order {number} has been assigned to you"),
                ));
            }
            out
        }
        (_, OrderStatus::InTransit) => vec![Notification::new(
            customer,
            order.id,
            NotificationKind::TripStarted,
            "On the way",
            format!("Order {number} is on its way"),
        )],
        (_, OrderStatus::Delivered) => vec![Notification::new(
            customer,
            order.id,
            NotificationKind::OrderDelivered,
            "Delivered",
            format!("Order {number} has been delivered"),
        )],
        (_, OrderStatus::Canceled) => {
            let body = match &order.reason_of_cancel {
                Some(reason) => format!("Order {number} was canceled: {reason}"),
                None => format!("Order {number} was canceled"),
            };
            let mut out = vec![Notification::new(
                customer,
                order.id,
                NotificationKind::OrderCanceled,
                "Order canceled",
                body.clone(),
            )];
            if let Some(driver_id) = order.driver_id {
                out.push(Notification::new(
                    driver_id,
                    order.id,
                    NotificationKind::OrderCanceled,
                    "Delivery canceled",
                    body,
                ));
            }
            out
        }
    }
}

pub async fn run_notification_dispatcher(
    state: Arc<AppState>,
    mut notification_rx: mpsc::Receiver<Notification>,
) {
    info!("notification dispatcher started");

    while let Some(notification) = notification_rx.recv().await {
        dispatch(&state, notification).await;
    }

    warn!("notification dispatcher stopped: queue channel closed");
}

async fn dispatch(state: &AppState, notification: Notification) {
    {
        let mut inbox = state.inbox.entry(notification.recipient_id).or_default();
        inbox.push(notification.clone());
        if inbox.len() > INBOX_CAPACITY {
            let overflow = inbox.len() - INBOX_CAPACITY;
            inbox.drain(..overflow);
        }
    }
    record(state, "in_app", "success");

    let outcome = match state
        .realtime_tx
        .send(RealtimeEvent::Notification(notification.clone()))
    {
        Ok(_) => "success",
        Err(_) => "no_subscribers",
    };
    record(state, "realtime", outcome);

    match state.push.send(&notification).await {
        Ok(()) => record(state, "push", "success"),
        Err(err) => {
            record(state, "push", "error");
            warn!(
                error = %err,
                recipient_id = %notification.recipient_id,
                order_id = %notification.order_id,
                "push notification failed"
            );
        }
    }
}

fn record(state: &AppState, channel: &str, outcome: &str) {
    state
        .metrics
        .notifications_total
        .with_label_values(&[channel, outcome])
        .inc();
}

/// Newest first.
pub fn list_inbox(state: &AppState, recipient_id: Uuid) -> Vec<Notification> {
    state
        .inbox
        .get(&recipient_id)
        .map(|entry| entry.value().iter().rev().cloned().collect())
        .unwrap_or_default()
}

pub fn mark_read(
    state: &AppState,
    recipient_id: Uuid,
    notification_id: Uuid,
) -> Result<Notification, AppError> {
    let mut inbox = state
        .inbox
        .get_mut(&recipient_id)
        .ok_or_else(|| AppError::NotFound(format!("notification {notification_id} not found")))?;

    let notification = inbox
        .iter_mut()
        .find(|notification| notification.id == notification_id)
        .ok_or_else(|| AppError::NotFound(format!("notification {notification_id} not found")))?;

    notification.read = true;
    Ok(notification.clone())
}
