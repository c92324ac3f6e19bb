use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use uuid::Uuid;

use crate::engine::notify;
use crate::error::AppError;
use crate::models::notification::Notification;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/:id/notifications", get(list_notifications))
        .route(
            "/users/:id/notifications/:notification_id/read",
            post(mark_read),
        )
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Json<Vec<Notification>> {
    Json(notify::list_inbox(&state, id))
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path((id, notification_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Notification>, AppError> {
    notify::mark_read(&state, id, notification_id).map(Json)
}
