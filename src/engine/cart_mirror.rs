//! Client-held copy of a customer's cart.
//!
//! Edits land in the local map immediately. Each product then gets one
//! debounced push of its final quantity to a [`CartBackend`]; edits made
//! inside the debounce window supersede earlier ones. A failed push is
//! reported on the error channel and, unless the user has edited the line
//! again in the meantime, the line falls back to the last quantity the server
//! accepted. Nothing here is transactional.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::engine::cart;
use crate::error::AppError;
use crate::models::cart::{Cart, CartLine, MAX_LINE_QUANTITY};
use crate::models::product::Product;
use crate::state::AppState;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[async_trait]
pub trait CartBackend: Send + Sync {
    async fn set_quantity(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
        quantity: u32,
    ) -> Result<(), AppError>;
}

/// Syncs a mirror straight into the in-process server cart.
pub struct StoreCartBackend {
    state: Arc<AppState>,
}

impl StoreCartBackend {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl CartBackend for StoreCartBackend {
    async fn set_quantity(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
        quantity: u32,
    ) -> Result<(), AppError> {
        cart::set_quantity(&self.state, customer_id, product_id, quantity).map(|_| ())
    }
}

#[derive(Debug, Clone)]
pub struct SyncError {
    pub product_id: Uuid,
    pub attempted: u32,
    /// Quantity the line was rolled back to, if a rollback happened.
    pub restored: Option<u32>,
    pub message: String,
}

#[derive(Debug, Clone)]
struct Slot {
    line: CartLine,
    confirmed: u32,
    generation: u64,
}

struct Inner {
    customer_id: Uuid,
    slots: DashMap<Uuid, Slot>,
    backend: Arc<dyn CartBackend>,
    debounce: Duration,
    errors_tx: mpsc::UnboundedSender<SyncError>,
    /// Shared by every slot so a number is never handed out twice, even
    /// across a hydrate.
    generation: AtomicU64,
}

#[derive(Clone)]
pub struct CartMirror {
    inner: Arc<Inner>,
}

impl CartMirror {
    pub fn new(
        customer_id: Uuid,
        backend: Arc<dyn CartBackend>,
        debounce: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SyncError>) {
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        (
            Self {
                inner: Arc::new(Inner {
                    customer_id,
                    slots: DashMap::new(),
                    backend,
                    debounce,
                    errors_tx,
                    generation: AtomicU64::new(0),
                }),
            },
            errors_rx,
        )
    }

    /// Replaces local state with a cart fetched from the server. Syncs still
    /// waiting on their debounce are superseded.
    pub fn hydrate(&self, server_cart: &Cart) {
        self.inner.slots.clear();
        for line in &server_cart.lines {
            self.inner.slots.insert(
                line.product_id,
                Slot {
                    line: line.clone(),
                    confirmed: line.quantity,
                    generation: self.inner.next_generation(),
                },
            );
        }
    }

    pub fn add(&self, product: &Product, quantity: u32) {
        let generation = {
            let mut slot = self.inner.slots.entry(product.id).or_insert_with(|| Slot {
                line: CartLine {
                    product_id: product.id,
                    name: product.name.clone(),
                    unit_price: product.price,
                    quantity: 0,
                },
                confirmed: 0,
                generation: 0,
            });
            slot.line.quantity = slot
                .line
                .quantity
                .saturating_add(quantity)
                .min(MAX_LINE_QUANTITY);
            slot.generation = self.inner.next_generation();
            slot.generation
        };

        self.schedule(product.id, generation);
    }

    pub fn set_quantity(&self, product_id: Uuid, quantity: u32) -> Result<(), AppError> {
        if quantity > MAX_LINE_QUANTITY {
            return Err(AppError::BadRequest(format!(
                "quantity must be at most {MAX_LINE_QUANTITY}"
            )));
        }

        let generation = {
            let mut slot = self
                .inner
                .slots
                .get_mut(&product_id)
                .ok_or_else(|| AppError::NotFound(format!("product {product_id} not in cart")))?;
            slot.line.quantity = quantity;
            slot.generation = self.inner.next_generation();
            slot.generation
        };

        self.schedule(product_id, generation);
        Ok(())
    }

    pub fn remove(&self, product_id: Uuid) -> Result<(), AppError> {
        self.set_quantity(product_id, 0)
    }

    pub fn quantity_of(&self, product_id: Uuid) -> u32 {
        self.inner
            .slots
            .get(&product_id)
            .map(|slot| slot.line.quantity)
            .unwrap_or(0)
    }

    pub fn lines(&self) -> Vec<CartLine> {
        let mut lines: Vec<CartLine> = self
            .inner
            .slots
            .iter()
            .filter(|slot| slot.line.quantity > 0)
            .map(|slot| slot.line.clone())
            .collect();
        lines.sort_by(|a, b| a.name.cmp(&b.name).then(a.product_id.cmp(&b.product_id)));
        lines
    }

    pub fn total(&self) -> Decimal {
        self.lines().iter().map(CartLine::subtotal).sum()
    }

    fn schedule(&self, product_id: Uuid, generation: u64) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            inner.flush(product_id, generation).await;
        });
    }
}

impl Inner {
    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    async fn flush(&self, product_id: Uuid, generation: u64) {
        let quantity = match self.slots.get(&product_id) {
            Some(slot) if slot.generation == generation => slot.line.quantity,
            _ => return,
        };

        match self
            .backend
            .set_quantity(self.customer_id, product_id, quantity)
            .await
        {
            Ok(()) => {
                if let Some(mut slot) = self.slots.get_mut(&product_id) {
                    slot.confirmed = quantity;
                }
                debug!(customer_id = %self.customer_id, product_id = %product_id, quantity, "cart line synced");
            }
            Err(err) => {
                let restored = self.slots.get_mut(&product_id).and_then(|mut slot| {
                    if slot.generation == generation {
                        slot.line.quantity = slot.confirmed;
                        Some(slot.confirmed)
                    } else {
                        None
                    }
                });

                warn!(
                    customer_id = %self.customer_id,
                    product_id = %product_id,
                    quantity,
                    restored = ?restored,
                    error = %err,
                    "cart sync failed"
                );

                let _ = self.errors_tx.send(SyncError {
                    product_id,
                    attempted: quantity,
                    restored,
                    message: err.to_string(),
                });
            }
        }
    }
}
