use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderPlaced,
    OrderAssigned,
    OrderReassigned,
    TripStarted,
    OrderDelivered,
    OrderCanceled,
    OrderReverted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub order_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient_id: Uuid,
        order_id: Uuid,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id,
            order_id,
            kind,
            title: title.into(),
            body: body.into(),
            read: false,
            created_at: Utc::now(),
        }
    }
}

/// Messages fanned out to websocket and SSE subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    StatusChanged {
        order_id: Uuid,
        order_number: String,
        from: crate::models::order::OrderStatus,
        to: crate::models::order::OrderStatus,
        driver_id: Option<Uuid>,
        at: DateTime<Utc>,
    },
    TripLocation {
        order_id: Uuid,
        driver_id: Uuid,
        latitude: f64,
        longitude: f64,
        update_count: u64,
        at: DateTime<Utc>,
    },
    Notification(Notification),
}
