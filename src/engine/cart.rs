use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::cart::{Cart, CartLine, MAX_LINE_QUANTITY};
use crate::models::product::Product;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingLine {
    pub product_id: Uuid,
    pub quantity: u32,
}

pub fn get_cart(state: &AppState, customer_id: Uuid) -> Cart {
    state
        .carts
        .get(&customer_id)
        .map(|entry| entry.value().clone())
        .unwrap_or_else(|| Cart::empty(customer_id))
}

fn active_product(state: &AppState, product_id: Uuid) -> Result<Product, AppError> {
    state
        .products
        .get(&product_id)
        .map(|entry| entry.value().clone())
        .filter(|product| product.active)
        .ok_or_else(|| AppError::NotFound(format!("product {product_id} not found")))
}

fn line_for(product: &Product, quantity: u32) -> CartLine {
    CartLine {
        product_id: product.id,
        name: product.name.clone(),
        unit_price: product.price,
        quantity,
    }
}

/// Sets the quantity of one product; zero removes the line.
pub fn set_quantity(
    state: &AppState,
    customer_id: Uuid,
    product_id: Uuid,
    quantity: u32,
) -> Result<Cart, AppError> {
    if quantity > MAX_LINE_QUANTITY {
        return Err(AppError::BadRequest(format!(
            "quantity must be at most {MAX_LINE_QUANTITY}"
        )));
    }

    if quantity == 0 {
        return Ok(remove_item(state, customer_id, product_id));
    }

    let product = active_product(state, product_id)?;
    let mut cart = state
        .carts
        .entry(customer_id)
        .or_insert_with(|| Cart::empty(customer_id));
    cart.put_line(line_for(&product, quantity));

    debug!(customer_id = %customer_id, product_id = %product_id, quantity, "cart line set");
    Ok(cart.clone())
}

pub fn remove_item(state: &AppState, customer_id: Uuid, product_id: Uuid) -> Cart {
    match state.carts.get_mut(&customer_id) {
        Some(mut cart) => {
            let existing = cart
                .lines
                .iter()
                .find(|line| line.product_id == product_id)
                .cloned();
            if let Some(line) = existing {
                cart.put_line(CartLine {
                    quantity: 0,
                    ..line
                });
            }
            cart.clone()
        }
        None => Cart::empty(customer_id),
    }
}

pub fn clear(state: &AppState, customer_id: Uuid) {
    state.carts.remove(&customer_id);
}

/// Folds a client-held cart into the server cart, keeping the larger
/// quantity of each product. Unknown or inactive products are skipped.
pub fn merge(state: &AppState, customer_id: Uuid, incoming: &[IncomingLine]) -> Cart {
    let resolved: Vec<(Product, u32)> = incoming
        .iter()
        .filter(|line| line.quantity > 0)
        .filter_map(|line| match active_product(state, line.product_id) {
            Ok(product) => Some((product, line.quantity.min(MAX_LINE_QUANTITY))),
            Err(_) => {
                warn!(
                    customer_id = %customer_id,
                    product_id = %line.product_id,
                    "skipping unknown product during cart merge"
                );
                None
            }
        })
        .collect();

    let mut cart = state
        .carts
        .entry(customer_id)
        .or_insert_with(|| Cart::empty(customer_id));

    for (product, quantity) in resolved {
        let merged = cart.quantity_of(product.id).max(quantity);
        cart.put_line(line_for(&product, merged));
    }

    cart.clone()
}
