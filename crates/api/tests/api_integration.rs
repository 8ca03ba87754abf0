//! Integration tests for the API server.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{MealId, Money};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::{InMemoryMealCatalog, InMemoryOrderStore, Meal};
use payment::SimulatedGateway;
use tower::ServiceExt;

use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> axum::Router {
    setup_with_store().0
}

fn setup_with_store() -> (axum::Router, InMemoryOrderStore) {
    let store = InMemoryOrderStore::new();
    let catalog = InMemoryMealCatalog::with_meals([Meal {
        meal_id: MealId::new(1),
        name: "Margherita Pizza".to_string(),
        price: Money::from_cents(999),
    }]);
    // Zero gateway latency keeps the tests fast.
    let state = api::create_state(
        store.clone(),
        Arc::new(catalog),
        SimulatedGateway::with_latency(Duration::ZERO),
    );
    let app = api::create_app(state, get_metrics_handle());
    (app, store)
}

fn cash_order_body() -> serde_json::Value {
    serde_json::json!({
        "user_id": 7,
        "items": [{ "meal_id": 1, "quantity": 2 }],
        "total_cents": 1998,
        "shipping_address": "12 Main St",
        "payment": { "method": "cash" }
    })
}

fn card_order_body(card_number: &str) -> serde_json::Value {
    serde_json::json!({
        "user_id": 7,
        "items": [{ "meal_id": 1, "quantity": 1 }],
        "total_cents": 999,
        "shipping_address": "12 Main St",
        "payment": {
            "method": "card",
            "card_number": card_number,
            "expiry": "12/29",
            "cvv": "123"
        }
    })
}

async fn post_json(
    app: axum::Router,
    uri: &str,
    body: &serde_json::Value,
) -> axum::response::Response {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(body).unwrap()))
            .unwrap(),
    )
    .await
    .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "checkout-api");
    assert!(json["version"].as_str().is_some());
}

#[tokio::test]
async fn test_cash_order_is_confirmed() {
    let app = setup();

    let response = post_json(app, "/orders", &cash_order_body()).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["status"], "confirmed");
    assert_eq!(json["message"], "cash on delivery order confirmed");
    assert!(json["order_id"].as_i64().is_some());
    assert!(json["payment_id"].as_str().is_some());
}

#[tokio::test]
async fn test_card_order_is_paid() {
    let app = setup();

    let response = post_json(app, "/orders", &card_order_body("4111111111111111")).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = json_body(response).await;
    assert_eq!(json["status"], "paid");
    assert_eq!(json["message"], "payment successful");
    assert!(json["payment_id"].as_str().unwrap().starts_with("PAY-"));
}

#[tokio::test]
async fn test_declined_card_returns_402_and_cancels() {
    let (app, store) = setup_with_store();

    let response = post_json(app.clone(), "/orders", &card_order_body("4111111111110000")).await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

    let json = json_body(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "payment declined");
    let order_id = json["order_id"].as_i64().unwrap();

    // The order exists and was compensated to cancelled.
    let get_response = app
        .oneshot(
            Request::builder()
                .uri(format!("/orders/{order_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let order = json_body(get_response).await;
    assert_eq!(order["status"], "cancelled");
    assert_eq!(store.payment_count().await, 0);
}

#[tokio::test]
async fn test_invalid_card_returns_402() {
    let app = setup();

    let response = post_json(app, "/orders", &card_order_body("1234")).await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

    let json = json_body(response).await;
    assert_eq!(json["message"], "invalid card details");
}

#[tokio::test]
async fn test_unknown_payment_method_is_rejected() {
    let app = setup();

    let mut body = cash_order_body();
    body["payment"]["method"] = serde_json::json!("bitcoin");

    let response = post_json(app, "/orders", &body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = json_body(response).await;
    assert_eq!(json["error"], "invalid payment method");
}

#[tokio::test]
async fn test_card_method_without_details_is_rejected() {
    let app = setup();

    let mut body = cash_order_body();
    body["payment"]["method"] = serde_json::json!("card");

    let response = post_json(app, "/orders", &body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_empty_order_is_rejected() {
    let app = setup();

    let mut body = cash_order_body();
    body["items"] = serde_json::json!([]);

    let response = post_json(app, "/orders", &body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_order_enriches_items_from_catalog() {
    let app = setup();

    let create_response = post_json(app.clone(), "/orders", &cash_order_body()).await;
    let created = json_body(create_response).await;
    let order_id = created["order_id"].as_i64().unwrap();

    let get_response = app
        .oneshot(
            Request::builder()
                .uri(format!("/orders/{order_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(get_response.status(), StatusCode::OK);

    let order = json_body(get_response).await;
    assert_eq!(order["order_id"], order_id);
    assert_eq!(order["user_id"], 7);
    assert_eq!(order["total_cents"], 1998);
    assert_eq!(order["status"], "confirmed");
    let items = order["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["meal_id"], 1);
    assert_eq!(items[0]["quantity"], 2);
    assert_eq!(items[0]["meal_name"], "Margherita Pizza");
    assert_eq!(items[0]["unit_price_cents"], 999);
}

#[tokio::test]
async fn test_get_nonexistent_order() {
    let app = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/orders/9999")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_user_orders_newest_first() {
    let app = setup();

    let first = json_body(post_json(app.clone(), "/orders", &cash_order_body()).await).await;
    let second = json_body(post_json(app.clone(), "/orders", &cash_order_body()).await).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/users/7/orders")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let orders: Vec<serde_json::Value> = serde_json::from_slice(
        &axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap(),
    )
    .unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0]["order_id"], second["order_id"]);
    assert_eq!(orders[1]["order_id"], first["order_id"]);
}

#[tokio::test]
async fn test_update_status_valid_transition() {
    let app = setup();

    let created = json_body(post_json(app.clone(), "/orders", &cash_order_body()).await).await;
    let order_id = created["order_id"].as_i64().unwrap();

    // confirmed -> cancelled is allowed
    let response = post_json(
        app,
        &format!("/orders/{order_id}/status"),
        &serde_json::json!({ "status": "cancelled" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["updated"], true);
}

#[tokio::test]
async fn test_update_status_invalid_transition_conflicts() {
    let app = setup();

    let created =
        json_body(post_json(app.clone(), "/orders", &card_order_body("4111111111111111")).await)
            .await;
    let order_id = created["order_id"].as_i64().unwrap();

    // paid -> confirmed is not a legal transition
    let response = post_json(
        app,
        &format!("/orders/{order_id}/status"),
        &serde_json::json!({ "status": "confirmed" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_update_status_unknown_status_is_rejected() {
    let app = setup();

    let response = post_json(
        app,
        "/orders/1/status",
        &serde_json::json!({ "status": "shipped" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_status_missing_order_reports_not_updated() {
    let app = setup();

    let response = post_json(
        app,
        "/orders/4242/status",
        &serde_json::json!({ "status": "cancelled" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["updated"], false);
}

#[tokio::test]
async fn test_idempotency_key_replay_returns_original_order() {
    let app = setup();

    let mut body = cash_order_body();
    body["idempotency_key"] = serde_json::json!("req-abc");

    let first_response = post_json(app.clone(), "/orders", &body).await;
    assert_eq!(first_response.status(), StatusCode::CREATED);
    let first = json_body(first_response).await;

    let second_response = post_json(app, "/orders", &body).await;
    assert_eq!(second_response.status(), StatusCode::OK);
    let second = json_body(second_response).await;

    assert_eq!(second["order_id"], first["order_id"]);
    assert_eq!(second["status"], "confirmed");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
