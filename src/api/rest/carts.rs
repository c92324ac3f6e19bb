use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::cart::{self, IncomingLine};
use crate::error::AppError;
use crate::models::cart::Cart;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/carts/:customer_id", get(get_cart).delete(clear_cart))
        .route(
            "/carts/:customer_id/items/:product_id",
            put(set_item).delete(remove_item),
        )
        .route("/carts/:customer_id/merge", post(merge_cart))
}

#[derive(Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct MergeRequest {
    pub items: Vec<IncomingLine>,
}

async fn get_cart(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<Uuid>,
) -> Json<Cart> {
    Json(cart::get_cart(&state, customer_id))
}

async fn clear_cart(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<Uuid>,
) -> StatusCode {
    cart::clear(&state, customer_id);
    StatusCode::NO_CONTENT
}

async fn set_item(
    State(state): State<Arc<AppState>>,
    Path((customer_id, product_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<SetQuantityRequest>,
) -> Result<Json<Cart>, AppError> {
    cart::set_quantity(&state, customer_id, product_id, payload.quantity).map(Json)
}

async fn remove_item(
    State(state): State<Arc<AppState>>,
    Path((customer_id, product_id)): Path<(Uuid, Uuid)>,
) -> Json<Cart> {
    Json(cart::remove_item(&state, customer_id, product_id))
}

async fn merge_cart(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<Uuid>,
    Json(payload): Json<MergeRequest>,
) -> Json<Cart> {
    Json(cart::merge(&state, customer_id, &payload.items))
}
