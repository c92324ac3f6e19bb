use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::engine::push::{LogPushSender, PushSender};
use crate::models::cart::Cart;
use crate::models::driver::Driver;
use crate::models::notification::{Notification, RealtimeEvent};
use crate::models::order::Order;
use crate::models::product::Product;
use crate::models::trip::ActiveTrip;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub products: DashMap<Uuid, Product>,
    pub carts: DashMap<Uuid, Cart>,
    pub orders: DashMap<Uuid, Order>,
    pub drivers: DashMap<Uuid, Driver>,
    /// Active trips keyed by order id.
    pub trips: DashMap<Uuid, ActiveTrip>,
    /// Driver id -> order id of the trip that driver holds.
    pub driver_trips: DashMap<Uuid, Uuid>,
    /// In-app inbox per recipient, oldest first.
    pub inbox: DashMap<Uuid, Vec<Notification>>,
    pub notification_tx: mpsc::Sender<Notification>,
    pub realtime_tx: broadcast::Sender<RealtimeEvent>,
    pub push: Arc<dyn PushSender>,
    pub metrics: Metrics,
    order_sequence: AtomicU64,
}

impl AppState {
    pub fn new(
        notification_queue_size: usize,
        event_buffer_size: usize,
    ) -> (Self, mpsc::Receiver<Notification>) {
        Self::with_push(
            notification_queue_size,
            event_buffer_size,
            Arc::new(LogPushSender),
        )
    }

    pub fn with_push(
        notification_queue_size: usize,
        event_buffer_size: usize,
        push: Arc<dyn PushSender>,
    ) -> (Self, mpsc::Receiver<Notification>) {
        let (notification_tx, notification_rx) = mpsc::channel(notification_queue_size);
        let (realtime_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        (
            Self {
                products: DashMap::new(),
                carts: DashMap::new(),
                orders: DashMap::new(),
                drivers: DashMap::new(),
                trips: DashMap::new(),
                driver_trips: DashMap::new(),
                inbox: DashMap::new(),
                notification_tx,
                realtime_tx,
                push,
                metrics: Metrics::new(),
                order_sequence: AtomicU64::new(0),
            },
            notification_rx,
        )
    }

    pub fn next_order_sequence(&self) -> u64 {
        self.order_sequence.fetch_add(1, Ordering::Relaxed) + 1
    }
}
