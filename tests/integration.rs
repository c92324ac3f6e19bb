use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use storefront_orders::api::rest::router;
use storefront_orders::engine::notify::run_notification_dispatcher;
use storefront_orders::models::notification::Notification;
use storefront_orders::state::AppState;
use tokio::sync::mpsc;
use tower::ServiceExt;

fn setup() -> (axum::Router, mpsc::Receiver<Notification>) {
    let (state, rx) = AppState::new(1024, 1024);
    (router(Arc::new(state)), rx)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    empty_request("GET", uri)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn create_product(app: &axum::Router, name: &str, price: &str) -> String {
    let (status, body) = send(
        app,
        json_request("POST", "/products", json!({ "name": name, "price": price })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["id"].as_str().unwrap().to_string()
}

async fn create_driver(app: &axum::Router, name: &str) -> String {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/drivers",
            json!({ "name": name, "phone": "+15550123" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["id"].as_str().unwrap().to_string()
}

/// Fills a cart and checks it out, returning the order JSON.
async fn place_order(app: &axum::Router, customer_id: &str) -> Value {
    let product_id = create_product(app, "Coffee beans", "8.40").await;
    let (status, _) = send(
        app,
        json_request(
            "PUT",
            &format!("/carts/{customer_id}/items/{product_id}"),
            json!({ "quantity": 2 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, order) = send(
        app,
        json_request(
            "POST",
            "/checkout",
            json!({
                "customer_id": customer_id,
                "address_id": uuid::Uuid::new_v4(),
                "shift_id": uuid::Uuid::new_v4(),
                "payment_method": "CASH_ON_DELIVERY"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    order
}

async fn assigned_order(app: &axum::Router) -> (String, String) {
    let customer_id = uuid::Uuid::new_v4().to_string();
    let order = place_order(app, &customer_id).await;
    let order_id = order["id"].as_str().unwrap().to_string();
    let driver_id = create_driver(app, "Sam").await;

    let (status, body) = send(
        app,
        json_request(
            "POST",
            &format!("/orders/{order_id}/assign"),
            json!({ "driver_id": driver_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ASSIGNED");

    (order_id, driver_id)
}

fn start_trip_request(driver_id: &str, order_id: &str) -> Request<Body> {
    json_request(
        "POST",
        &format!("/drivers/{driver_id}/trip"),
        json!({
            "order_id": order_id,
            "location": { "lat": 52.52, "lng": 13.405 }
        }),
    )
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _rx) = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["orders"], 0);
    assert_eq!(body["drivers"], 0);
    assert_eq!(body["active_trips"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let (app, _rx) = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("active_trips"));
}

#[tokio::test]
async fn create_product_rejects_non_positive_price() {
    let (app, _rx) = setup();
    let (status, body) = send(
        &app,
        json_request("POST", "/products", json!({ "name": "Tea", "price": "0" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn cart_set_merge_and_remove() {
    let (app, _rx) = setup();
    let customer_id = uuid::Uuid::new_v4();
    let tea = create_product(&app, "Tea", "2.50").await;
    let jam = create_product(&app, "Jam", "4.00").await;

    let (status, cart) = send(
        &app,
        json_request(
            "PUT",
            &format!("/carts/{customer_id}/items/{tea}"),
            json!({ "quantity": 3 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["total"], "7.50");

    let (status, cart) = send(
        &app,
        json_request(
            "POST",
            &format!("/carts/{customer_id}/merge"),
            json!({ "items": [
                { "product_id": tea, "quantity": 1 },
                { "product_id": jam, "quantity": 2 }
            ] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["lines"].as_array().unwrap().len(), 2);
    assert_eq!(cart["total"], "15.50");

    let (status, cart) = send(
        &app,
        empty_request("DELETE", &format!("/carts/{customer_id}/items/{tea}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["lines"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, empty_request("DELETE", &format!("/carts/{customer_id}"))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, cart) = send(&app, get_request(&format!("/carts/{customer_id}"))).await;
    assert!(cart["lines"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn checkout_with_empty_cart_returns_400() {
    let (app, _rx) = setup();
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/checkout",
            json!({
                "customer_id": uuid::Uuid::new_v4(),
                "address_id": uuid::Uuid::new_v4(),
                "shift_id": uuid::Uuid::new_v4(),
                "payment_method": "CARD"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "EMPTY_CART");
}

#[tokio::test]
async fn checkout_creates_pending_order() {
    let (app, _rx) = setup();
    let customer_id = uuid::Uuid::new_v4().to_string();
    let order = place_order(&app, &customer_id).await;

    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["amount"], "16.80");
    assert_eq!(order["order_number"], "ORD-000001");
    assert!(order["driver_id"].is_null());

    let (_, listed) = send(
        &app,
        get_request(&format!("/orders?customer_id={customer_id}&status=PENDING")),
    )
    .await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn get_nonexistent_order_returns_404() {
    let (app, _rx) = setup();
    let fake_id = "00000000-0000-0000-0000-000000000000";
    let response = app
        .oneshot(get_request(&format!("/orders/{fake_id}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_transition_returns_conflict_code() {
    let (app, _rx) = setup();
    let customer_id = uuid::Uuid::new_v4().to_string();
    let order = place_order(&app, &customer_id).await;
    let order_id = order["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        json_request(
            "PATCH",
            &format!("/orders/{order_id}/status"),
            json!({ "status": "DELIVERED" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STATUS_TRANSITION");
}

#[tokio::test]
async fn status_route_does_not_start_trips() {
    let (app, _rx) = setup();
    let (order_id, driver_id) = assigned_order(&app).await;

    let (status, body) = send(
        &app,
        json_request(
            "PATCH",
            &format!("/orders/{order_id}/status"),
            json!({ "status": "IN_TRANSIT" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "USE_START_TRIP");

    let (_, order) = send(&app, get_request(&format!("/orders/{order_id}"))).await;
    assert_eq!(order["status"], "ASSIGNED");
    let (_, trips) = send(&app, get_request("/trips")).await;
    assert_eq!(trips.as_array().unwrap().len(), 0);

    let (status, _) = send(&app, start_trip_request(&driver_id, &order_id)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn cancel_without_body_is_accepted() {
    let (app, _rx) = setup();
    let (order_id, _) = assigned_order(&app).await;

    let (status, canceled) = send(
        &app,
        empty_request("POST", &format!("/orders/{order_id}/cancel")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(canceled["status"], "CANCELED");
    assert!(canceled["reason_of_cancel"].is_null());

    let (second_order, driver_id) = assigned_order(&app).await;
    let (status, canceled) = send(
        &app,
        empty_request(
            "POST",
            &format!("/drivers/{driver_id}/orders/{second_order}/cancel"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(canceled["status"], "CANCELED");
}

#[tokio::test]
async fn second_trip_for_same_driver_is_rejected() {
    let (app, _rx) = setup();
    let (first_order, driver_id) = assigned_order(&app).await;

    let customer_id = uuid::Uuid::new_v4().to_string();
    let second = place_order(&app, &customer_id).await;
    let second_order = second["id"].as_str().unwrap().to_string();
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/orders/{second_order}/assign"),
            json!({ "driver_id": driver_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, start_trip_request(&driver_id, &first_order)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, start_trip_request(&driver_id, &second_order)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ACTIVE_TRIP_EXISTS");
}

#[tokio::test]
async fn full_delivery_flow() {
    let (state, rx) = AppState::new(1024, 1024);
    let shared = Arc::new(state);
    tokio::spawn(run_notification_dispatcher(shared.clone(), rx));
    let app = router(shared.clone());

    let (order_id, driver_id) = assigned_order(&app).await;

    let (status, trip) = send(&app, start_trip_request(&driver_id, &order_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trip["update_count"], 0);

    let (status, trip) = send(
        &app,
        json_request(
            "PATCH",
            &format!("/drivers/{driver_id}/trip/location"),
            json!({ "location": { "lat": 52.53, "lng": 13.41 } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trip["update_count"], 1);
    assert_eq!(trip["latitude"], 52.53);

    let (status, resumed) = send(&app, get_request(&format!("/drivers/{driver_id}/trip"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resumed["order"]["status"], "IN_TRANSIT");

    let (_, trips) = send(&app, get_request("/trips")).await;
    assert_eq!(trips.as_array().unwrap().len(), 1);

    let (status, delivered) = send(
        &app,
        empty_request("POST", &format!("/drivers/{driver_id}/trip/deliver")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(delivered["status"], "DELIVERED");

    let (_, trips) = send(&app, get_request("/trips")).await;
    assert!(trips.as_array().unwrap().is_empty());

    let (status, body) = send(&app, get_request(&format!("/drivers/{driver_id}/trip"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NO_ACTIVE_TRIP");

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/orders/{order_id}/cancel"),
            json!({ "reason": "too late" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STATUS_TRANSITION");

    tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

    let customer_id = delivered["customer_id"].as_str().unwrap();
    let (status, inbox) = send(
        &app,
        get_request(&format!("/users/{customer_id}/notifications")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let kinds: Vec<&str> = inbox
        .as_array()
        .unwrap()
        .iter()
        .map(|notification| notification["kind"].as_str().unwrap())
        .collect();
    assert_eq!(
        kinds,
        vec!["order_delivered", "trip_started", "order_assigned", "order_placed"]
    );

    let notification_id = inbox[0]["id"].as_str().unwrap();
    let (status, read) = send(
        &app,
        empty_request(
            "POST",
            &format!("/users/{customer_id}/notifications/{notification_id}/read"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["read"], true);
}

#[tokio::test]
async fn driver_revert_then_cancel() {
    let (app, _rx) = setup();
    let (order_id, driver_id) = assigned_order(&app).await;

    let (status, _) = send(&app, start_trip_request(&driver_id, &order_id)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, reverted) = send(
        &app,
        empty_request(
            "POST",
            &format!("/drivers/{driver_id}/orders/{order_id}/revert"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reverted["status"], "ASSIGNED");

    let stranger = create_driver(&app, "Alex").await;
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/drivers/{stranger}/orders/{order_id}/cancel"),
            json!({ "reason": "not mine" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "ORDER_NOT_ASSIGNED_TO_DRIVER");

    let (status, canceled) = send(
        &app,
        json_request(
            "POST",
            &format!("/drivers/{driver_id}/orders/{order_id}/cancel"),
            json!({ "reason": "customer refused" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(canceled["status"], "CANCELED");
    assert_eq!(canceled["reason_of_cancel"], "customer refused");
}

#[tokio::test]
async fn inactive_driver_cannot_be_assigned() {
    let (app, _rx) = setup();
    let customer_id = uuid::Uuid::new_v4().to_string();
    let order = place_order(&app, &customer_id).await;
    let order_id = order["id"].as_str().unwrap();
    let driver_id = create_driver(&app, "Robin").await;

    let (status, driver) = send(
        &app,
        json_request(
            "PATCH",
            &format!("/drivers/{driver_id}/active"),
            json!({ "active": false }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(driver["active"], false);

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/orders/{order_id}/assign"),
            json!({ "driver_id": driver_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn start_trip_rejects_bad_coordinates() {
    let (app, _rx) = setup();
    let (order_id, driver_id) = assigned_order(&app).await;

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/drivers/{driver_id}/trip"),
            json!({
                "order_id": order_id,
                "location": { "lat": 123.0, "lng": 13.4 }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
