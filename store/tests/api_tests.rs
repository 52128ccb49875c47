
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use fulfillment::queue::InMemoryQueue;
use fulfillment::rewards::RewardsProcessor;
use http_body_util::BodyExt;
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};
use std::sync::Arc;
use store::api::{AppState, router};
use store::storage::StoreStorage;
use test_helpers::{MemProofStore, connect_test_db};
use tower::ServiceExt;

async fn app() -> (Router, DatabaseConnection, Arc<InMemoryQueue>) {
    let db = connect_test_db().await;
    let queue = Arc::new(InMemoryQueue::new());
    let state = AppState::new(
        db.clone(),
        Arc::new(MemProofStore::default()),
        queue.clone(),
        "storefront@okbank".into(),
    );
    (router(state, "http://localhost:5173"), db, queue)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        request = request.header("x-user-id", user);
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, value)
}

async fn create_product(app: &Router, body: Value) -> i64 {
    let (status, created) = send(app, "POST", "/admin/products", None, Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    created["id"].as_i64().unwrap()
}

#[tokio::test]
async fn health_is_open() {
    let (app, _, _) = app().await;
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn payment_info_exposes_the_upi_address() {
    let (app, _, _) = app().await;
    let (status, body) = send(&app, "GET", "/api/payment-info", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["upi_vpa"], "storefront@okbank");
}

#[tokio::test]
async fn storefront_requests_need_a_user() {
    let (app, _, _) = app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/orders",
        None,
        Some(json!({ "product_id": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("x-user-id"));
}

#[tokio::test]
async fn checkout_approval_and_rewards_over_http() {
    let (app, db, queue) = app().await;
    let product_id = create_product(
        &app,
        json!({
            "name": "Streaming Plus",
            "sale_price": 999,
            "cost_price": 500,
            "delivery_type": "manual_activation",
            "use_manual_stock": true,
            "manual_stock_count": 3
        }),
    )
    .await;

    // Place the order and upload a payment screenshot.
    let (status, order) = send(
        &app,
        "POST",
        "/api/orders",
        Some("buyer"),
        Some(json!({ "product_id": product_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "pending");
    assert_eq!(order["total_amount"], 999);
    let order_id = order["id"].as_i64().unwrap();

    let proof = Request::builder()
        .method("POST")
        .uri(format!("/api/orders/{order_id}/proof"))
        .header("x-user-id", "buyer")
        .header(header::CONTENT_TYPE, "image/png")
        .body(Body::from(&b"png-bytes"[..]))
        .unwrap();
    let response = app.clone().oneshot(proof).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Approve from the back office.
    let (status, approved) = send(
        &app,
        "POST",
        &format!("/admin/orders/{order_id}/approve"),
        None,
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "completed");

    // Drain the rewards queue the way the worker binary does.
    let storage = Arc::new(StoreStorage::new(db));
    let processor = RewardsProcessor::new(
        queue,
        storage.clone(),
        storage.clone(),
        storage.clone(),
        storage.clone(),
    );
    while processor.process_next().await.unwrap().is_some() {}

    let (status, account) = send(&app, "GET", "/api/loyalty", Some("buyer"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(account["total_points"], 99);
    assert_eq!(account["tier"], "bronze");
}

#[tokio::test]
async fn orders_are_invisible_to_other_users() {
    let (app, _, _) = app().await;
    let product_id = create_product(
        &app,
        json!({
            "name": "VPN",
            "sale_price": 200,
            "cost_price": 100,
            "delivery_type": "manual_activation",
            "use_manual_stock": true,
            "manual_stock_count": 1
        }),
    )
    .await;

    let (_, order) = send(
        &app,
        "POST",
        "/api/orders",
        Some("alice"),
        Some(json!({ "product_id": product_id })),
    )
    .await;
    let order_id = order["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/orders/{order_id}"),
        Some("mallory"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn redeeming_without_points_conflicts() {
    let (app, _, _) = app().await;
    let (status, body) = send(&app, "POST", "/api/loyalty/redeem", Some("broke"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("insufficient"));
}

#[tokio::test]
async fn flash_sale_config_flows_through_to_the_listing() {
    let (app, _, _) = app().await;
    let product_id = create_product(
        &app,
        json!({
            "name": "Music",
            "sale_price": 599,
            "cost_price": 300,
            "delivery_type": "manual_activation",
            "use_manual_stock": true,
            "manual_stock_count": 9
        }),
    )
    .await;

    let ends_at = (chrono::Utc::now().naive_utc() + chrono::Duration::hours(1))
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string();
    let (status, config) = send(
        &app,
        "PUT",
        "/admin/flash-sale",
        None,
        Some(json!({
            "enabled": true,
            "ends_at": ends_at,
            "discounts": [{ "product_id": product_id, "discount_amount": 100 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(config["version"], 1);

    let (status, listing) = send(&app, "GET", "/api/products", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let listed = listing
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["id"].as_i64() == Some(product_id))
        .unwrap();
    assert_eq!(listed["sale_price"], 599);
    assert_eq!(listed["effective_price"], 499);
}

#[tokio::test]
async fn oversized_proof_uploads_are_rejected() {
    let (app, _, _) = app().await;
    let product_id = create_product(
        &app,
        json!({
            "name": "Cloud",
            "sale_price": 100,
            "cost_price": 50,
            "delivery_type": "manual_activation",
            "use_manual_stock": true,
            "manual_stock_count": 1
        }),
    )
    .await;
    let (_, order) = send(
        &app,
        "POST",
        "/api/orders",
        Some("buyer"),
        Some(json!({ "product_id": product_id })),
    )
    .await;
    let order_id = order["id"].as_i64().unwrap();

    let proof = Request::builder()
        .method("POST")
        .uri(format!("/api/orders/{order_id}/proof"))
        .header("x-user-id", "buyer")
        .header(header::CONTENT_TYPE, "application/zip")
        .body(Body::from(&b"zip-bytes"[..]))
        .unwrap();
    let response = app.clone().oneshot(proof).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
