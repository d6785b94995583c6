//! Checkout turns every cart line into a purchase record and a snapshot,
//! reduces stock and empties the cart.

mod common;

use std::str::FromStr;

use axum::http::{Method, StatusCode};
use common::{field_messages, response_json, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use serde_json::{json, Value};
use storefront_api::entities::{item, purchase_record, purchase_snapshot};
use uuid::Uuid;

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("not a decimal: {other}"),
    }
}

fn payment() -> Value {
    json!({
        "phone_number": "+380501234567",
        "card_number": "4111 1111 1111 1234",
        "cvv": "123"
    })
}

async fn add_to_cart(app: &TestApp, token: &str, item_id: Uuid) -> Value {
    let response = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "item_id": item_id })),
            Some(token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    response_json(response).await
}

async fn checkout(app: &TestApp, token: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .request(Method::POST, "/api/v1/checkout", Some(body), Some(token))
        .await;
    let status = response.status();
    (status, response_json(response).await)
}

#[tokio::test]
async fn chair_pair_becomes_one_record_and_one_snapshot() {
    let app = TestApp::new().await;
    let (buyer, token) = app.customer("olena").await;
    let chair = app.seed_item("Chair", dec!(100), 5, None).await;

    add_to_cart(&app, &token, chair).await;
    let second = add_to_cart(&app, &token, chair).await;
    assert_eq!(second["line"]["quantity"], 2);

    let (status, receipt) = checkout(&app, &token, payment()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["purchased_lines"], 1);
    assert_eq!(receipt["purchased_units"], 2);
    assert_eq!(decimal(&receipt["total"]), dec!(200));
    assert_eq!(receipt["redirect_to"], "/api/v1/index");

    let db = &*app.state.db;
    let records = purchase_record::Entity::find().all(db).await.unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.user_id, buyer.id);
    assert_eq!(record.item_id, chair);
    assert_eq!(record.item_quantity, 2);
    assert_eq!(record.total(), dec!(200));
    assert_eq!(record.card_number, "**** **** **** 1234");
    assert_eq!(record.cvv, "***");
    assert_eq!(record.phone_number, "+380501234567");
    assert!(record.status);

    let snapshots = purchase_snapshot::Entity::find().all(db).await.unwrap();
    assert_eq!(snapshots.len(), 1);
    assert!(snapshots[0].to_string().starts_with("Chair x2 @ "));

    assert_eq!(app.item(chair).await.unwrap().count, 3);

    let cart = response_json(app.get("/api/v1/cart", Some(&token)).await).await;
    assert_eq!(cart["lines"].as_array().unwrap().len(), 0);
    assert_eq!(decimal(&cart["total_price"]), Decimal::ZERO);
}

#[tokio::test]
async fn every_line_is_purchased() {
    let app = TestApp::new().await;
    let (_, token) = app.customer("taras").await;
    let chair = app.seed_item("Chair", dec!(100), 5, None).await;
    let table = app.seed_item("Table", dec!(250.50), 2, None).await;
    let shelf = app.seed_item("Shelf", dec!(39.90), 9, None).await;

    for id in [chair, table, shelf] {
        add_to_cart(&app, &token, id).await;
    }

    let (status, receipt) = checkout(&app, &token, payment()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["purchased_lines"], 3);
    assert_eq!(decimal(&receipt["total"]), dec!(390.40));

    let db = &*app.state.db;
    assert_eq!(purchase_record::Entity::find().count(db).await.unwrap(), 3);
    assert_eq!(purchase_snapshot::Entity::find().count(db).await.unwrap(), 3);
    assert_eq!(app.item(table).await.unwrap().count, 1);
}

#[tokio::test]
async fn stock_never_goes_negative() {
    let app = TestApp::new().await;
    let (_, token) = app.customer("iryna").await;
    let lamp = app.seed_item("Lamp", dec!(20), 1, None).await;
    add_to_cart(&app, &token, lamp).await;

    // Stock sold elsewhere after the line was added
    let model = app.item(lamp).await.unwrap();
    let mut active: item::ActiveModel = model.into();
    active.count = Set(0);
    active.update(&*app.state.db).await.unwrap();

    let (status, _) = checkout(&app, &token, payment()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.item(lamp).await.unwrap().count, 0);
    assert_eq!(
        purchase_record::Entity::find()
            .count(&*app.state.db)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn empty_cart_checkout_changes_nothing() {
    let app = TestApp::new().await;
    let (_, token) = app.customer("andrii").await;

    let (status, receipt) = checkout(&app, &token, payment()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["purchased_lines"], 0);
    assert_eq!(decimal(&receipt["total"]), Decimal::ZERO);
    assert_eq!(
        purchase_record::Entity::find()
            .count(&*app.state.db)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn invalid_payment_keeps_the_cart() {
    let app = TestApp::new().await;
    let (_, token) = app.customer("sofia").await;
    let chair = app.seed_item("Chair", dec!(100), 5, None).await;
    add_to_cart(&app, &token, chair).await;

    let (status, body) = checkout(
        &app,
        &token,
        json!({
            "phone_number": "0501234567",
            "card_number": "4111 1111 1111",
            "cvv": "12a"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!field_messages(&body, "phone_number").is_empty());
    assert!(!field_messages(&body, "card_number").is_empty());
    assert!(!field_messages(&body, "cvv").is_empty());

    let cart = response_json(app.get("/api/v1/cart", Some(&token)).await).await;
    assert_eq!(cart["lines"].as_array().unwrap().len(), 1);
    assert_eq!(app.item(chair).await.unwrap().count, 5);
}

#[tokio::test]
async fn checkout_requires_login() {
    let app = TestApp::new().await;
    let response = app
        .request(Method::POST, "/api/v1/checkout", Some(payment()), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn failure_on_a_later_line_rolls_back_earlier_lines() {
    use sea_orm::ConnectionTrait;

    let app = TestApp::new().await;
    let (_, token) = app.customer("ostap").await;
    let chair = app.seed_item("Chair", dec!(100), 5, None).await;
    let lamp = app.seed_item("Lamp", dec!(40), 5, None).await;
    add_to_cart(&app, &token, chair).await;
    add_to_cart(&app, &token, lamp).await;

    let db = &*app.state.db;
    db.execute_unprepared(
        "CREATE TRIGGER lamp_stock_locked BEFORE UPDATE ON items \
         WHEN OLD.name = 'Lamp' \
         BEGIN SELECT RAISE(ABORT, 'lamp stock locked'); END",
    )
    .await
    .unwrap();

    let (status, _) = checkout(&app, &token, payment()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    assert_eq!(app.item(chair).await.unwrap().count, 5);
    assert_eq!(app.item(lamp).await.unwrap().count, 5);
    assert_eq!(purchase_record::Entity::find().count(db).await.unwrap(), 0);
    assert_eq!(purchase_snapshot::Entity::find().count(db).await.unwrap(), 0);

    let cart = app.get("/api/v1/cart", Some(&token)).await;
    let lines = response_json(cart).await["lines"].as_array().unwrap().len();
    assert_eq!(lines, 2);
}
