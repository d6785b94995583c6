//! Integration tests for the signed-in user's cart.
//!
//! Tests cover:
//! - Adding items and merging repeated adds into one line
//! - Stock limits on add and on quantity updates
//! - Line ownership
//! - Cart totals and display strings
//! - Lines and carts written by a competing request

mod common;

use std::str::FromStr;

use axum::http::{Method, StatusCode};
use common::{field_messages, response_json, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use storefront_api::repositories::CartRepository;
use uuid::Uuid;

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("not a decimal: {other}"),
    }
}

async fn add(app: &TestApp, token: &str, item_id: Uuid) -> (StatusCode, Value) {
    let response = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "item_id": item_id })),
            Some(token),
        )
        .await;
    let status = response.status();
    (status, response_json(response).await)
}

async fn set_quantity(app: &TestApp, token: &str, line_id: &str, quantity: i32) -> (StatusCode, Value) {
    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/cart/items/{}", line_id),
            Some(json!({ "quantity": quantity })),
            Some(token),
        )
        .await;
    let status = response.status();
    (status, response_json(response).await)
}

async fn cart(app: &TestApp, token: &str) -> Value {
    let response = app.get("/api/v1/cart", Some(token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    response_json(response).await
}

// ==================== Viewing ====================

#[tokio::test]
async fn new_user_sees_an_empty_cart() {
    let app = TestApp::new().await;
    let (_, token) = app.customer("marta").await;

    let body = cart(&app, &token).await;
    assert!(body["id"].is_null());
    assert_eq!(body["display"], "Cart of marta");
    assert_eq!(body["lines"].as_array().unwrap().len(), 0);
    assert_eq!(decimal(&body["total_price"]), Decimal::ZERO);
}

#[tokio::test]
async fn cart_requires_login() {
    let app = TestApp::new().await;
    let response = app.get("/api/v1/cart", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ==================== Adding ====================

#[tokio::test]
async fn adding_twice_merges_into_one_line() {
    let app = TestApp::new().await;
    let (_, token) = app.customer("bohdan").await;
    let chair = app.seed_item("Chair", dec!(100), 5, None).await;

    let (status, first) = add(&app, &token, chair).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["incremented"], true);
    assert_eq!(first["line"]["quantity"], 1);

    let (_, second) = add(&app, &token, chair).await;
    assert_eq!(second["incremented"], true);
    assert_eq!(second["line"]["quantity"], 2);
    assert_eq!(second["line"]["id"], first["line"]["id"]);
    assert_eq!(second["cart_id"], first["cart_id"]);

    let body = cart(&app, &token).await;
    let lines = body["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["display"], "Sum for 2 × Chair: $200.00");
    assert_eq!(decimal(&body["total_price"]), dec!(200));
}

#[tokio::test]
async fn adding_stops_at_stock() {
    let app = TestApp::new().await;
    let (_, token) = app.customer("halyna").await;
    let sofa = app.seed_item("Sofa", dec!(799.99), 2, None).await;

    add(&app, &token, sofa).await;
    add(&app, &token, sofa).await;
    let (status, third) = add(&app, &token, sofa).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(third["incremented"], false);
    assert_eq!(third["line"]["quantity"], 2);
    assert_eq!(third["line"]["in_stock"], 2);
}

#[tokio::test]
async fn adding_unknown_item_is_not_found() {
    let app = TestApp::new().await;
    let (_, token) = app.customer("yurii").await;

    let (status, _) = add(&app, &token, Uuid::new_v4()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn total_sums_every_line() {
    let app = TestApp::new().await;
    let (_, token) = app.customer("oksana").await;
    let chair = app.seed_item("Chair", dec!(100), 5, None).await;
    let shelf = app.seed_item("Shelf", dec!(39.90), 5, None).await;

    add(&app, &token, chair).await;
    add(&app, &token, shelf).await;
    add(&app, &token, shelf).await;

    let body = cart(&app, &token).await;
    assert_eq!(body["lines"].as_array().unwrap().len(), 2);
    assert_eq!(decimal(&body["total_price"]), dec!(179.80));
}

// ==================== Quantity updates ====================

#[tokio::test]
async fn quantity_can_be_set_within_stock() {
    let app = TestApp::new().await;
    let (_, token) = app.customer("vasyl").await;
    let chair = app.seed_item("Chair", dec!(100), 5, None).await;
    let (_, added) = add(&app, &token, chair).await;
    let line_id = added["line"]["id"].as_str().unwrap().to_string();

    let (status, line) = set_quantity(&app, &token, &line_id, 5).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(line["quantity"], 5);
    assert_eq!(decimal(&line["line_total"]), dec!(500));
}

#[tokio::test]
async fn quantity_below_one_is_rejected() {
    let app = TestApp::new().await;
    let (_, token) = app.customer("lesia").await;
    let chair = app.seed_item("Chair", dec!(100), 5, None).await;
    let (_, added) = add(&app, &token, chair).await;
    let line_id = added["line"]["id"].as_str().unwrap().to_string();

    let (status, body) = set_quantity(&app, &token, &line_id, 0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!field_messages(&body, "quantity").is_empty());

    let view = cart(&app, &token).await;
    assert_eq!(view["lines"][0]["quantity"], 1);
}

#[tokio::test]
async fn quantity_above_stock_is_rejected_and_unchanged() {
    let app = TestApp::new().await;
    let (_, token) = app.customer("petro").await;
    let chair = app.seed_item("Chair", dec!(100), 3, None).await;
    let (_, added) = add(&app, &token, chair).await;
    let line_id = added["line"]["id"].as_str().unwrap().to_string();

    let (status, body) = set_quantity(&app, &token, &line_id, 4).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        field_messages(&body, "quantity"),
        vec!["Chair on warehouse: 3\nYou can select maximum 3 of Chair".to_string()]
    );

    let view = cart(&app, &token).await;
    assert_eq!(view["lines"][0]["quantity"], 1);
}

// ==================== Ownership ====================

#[tokio::test]
async fn other_users_lines_are_invisible() {
    let app = TestApp::new().await;
    let (_, owner) = app.customer("owner").await;
    let (_, intruder) = app.customer("intruder").await;
    let chair = app.seed_item("Chair", dec!(100), 5, None).await;
    let (_, added) = add(&app, &owner, chair).await;
    let line_id = added["line"]["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/cart/items/{}", line_id),
            None,
            Some(&intruder),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let (status, _) = set_quantity(&app, &intruder, &line_id, 2).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert_eq!(cart(&app, &owner).await["lines"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn owner_can_remove_a_line() {
    let app = TestApp::new().await;
    let (_, token) = app.customer("dmytro").await;
    let chair = app.seed_item("Chair", dec!(100), 5, None).await;
    let (_, added) = add(&app, &token, chair).await;
    let line_id = added["line"]["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/cart/items/{}", line_id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(cart(&app, &token).await["lines"].as_array().unwrap().len(), 0);
}

// ==================== Competing writes ====================

#[tokio::test]
async fn cart_is_created_once_per_user() {
    let app = TestApp::new().await;
    let (user, _) = app.customer("taras").await;
    let carts = CartRepository::new(&*app.state.db);

    let first = carts.get_or_create(user.id).await.unwrap();
    let second = carts.get_or_create(user.id).await.unwrap();
    assert_eq!(first.id, second.id);
}

#[tokio::test]
async fn duplicate_line_insert_is_skipped() {
    let app = TestApp::new().await;
    let (user, _) = app.customer("iryna").await;
    let chair = app.seed_item("Chair", dec!(100), 5, None).await;
    let carts = CartRepository::new(&*app.state.db);
    let cart = carts.get_or_create(user.id).await.unwrap();

    let line = carts
        .insert_line_if_absent(cart.id, chair, 1)
        .await
        .unwrap()
        .expect("first insert");
    assert_eq!(line.quantity, 1);

    let again = carts.insert_line_if_absent(cart.id, chair, 3).await.unwrap();
    assert!(again.is_none());
    let kept = carts.find_line(cart.id, chair).await.unwrap().unwrap();
    assert_eq!(kept.id, line.id);
    assert_eq!(kept.quantity, 1);
}

#[tokio::test]
async fn add_grows_a_line_written_by_another_request() {
    let app = TestApp::new().await;
    let (user, token) = app.customer("yurii").await;
    let chair = app.seed_item("Chair", dec!(100), 5, None).await;
    let carts = CartRepository::new(&*app.state.db);
    let cart = carts.get_or_create(user.id).await.unwrap();
    carts.insert_line_if_absent(cart.id, chair, 1).await.unwrap();

    let (status, body) = add(&app, &token, chair).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cart_id"], json!(cart.id));
    assert_eq!(body["line"]["quantity"], 2);
    assert_eq!(cart_lines(&app, &token).await, 1);
}

async fn cart_lines(app: &TestApp, token: &str) -> usize {
    cart(app, token).await["lines"].as_array().unwrap().len()
}
