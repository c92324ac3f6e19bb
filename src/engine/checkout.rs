use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::notify::order_status_changed;
use crate::error::AppError;
use crate::models::order::{Order, OrderItem, OrderStatus, PaymentMethod, format_order_number};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub customer_id: Uuid,
    pub address_id: Uuid,
    pub shift_id: Uuid,
    pub payment_method: PaymentMethod,
}

/// Turns the customer's cart into a PENDING order and empties the cart.
pub fn checkout(state: &AppState, request: CheckoutRequest) -> Result<Order, AppError> {
    let cart = state
        .carts
        .remove(&request.customer_id)
        .map(|(_, cart)| cart)
        .filter(|cart| !cart.is_empty())
        .ok_or(AppError::EmptyCart)?;

    let items: Vec<OrderItem> = cart
        .lines
        .iter()
        .map(|line| OrderItem {
            product_id: line.product_id,
            name: line.name.clone(),
            unit_price: line.unit_price,
            quantity: line.quantity,
        })
        .collect();

    let now = Utc::now();
    let order = Order {
        id: Uuid::new_v4(),
        order_number: format_order_number(state.next_order_sequence()),
        customer_id: request.customer_id,
        address_id: request.address_id,
        driver_id: None,
        shift_id: request.shift_id,
        status: OrderStatus::Pending,
        items,
        amount: cart.total,
        payment_method: request.payment_method,
        reason_of_cancel: None,
        created_at: now,
        updated_at: now,
    };

    state.orders.insert(order.id, order.clone());

    info!(
        order_id = %order.id,
        order_number = %order.order_number,
        customer_id = %order.customer_id,
        amount = %order.amount,
        "order placed"
    );
    order_status_changed(state, &order, OrderStatus::Pending);

    Ok(order)
}
