use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::post;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::product::Product;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/products", post(create_product).get(list_products))
}

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub price: Decimal,
}

async fn create_product(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<Json<Product>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    if payload.price <= Decimal::ZERO {
        return Err(AppError::BadRequest("price must be > 0".to_string()));
    }

    let product = Product {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        price: payload.price,
        active: true,
    };

    state.products.insert(product.id, product.clone());
    Ok(Json(product))
}

async fn list_products(State(state): State<Arc<AppState>>) -> Json<Vec<Product>> {
    let mut products: Vec<Product> = state
        .products
        .iter()
        .filter(|entry| entry.value().active)
        .map(|entry| entry.value().clone())
        .collect();
    products.sort_by(|a, b| a.name.cmp(&b.name));
    Json(products)
}
