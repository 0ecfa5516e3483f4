//! End-to-end flows against a real database.
//!
//! Each test returns early unless `BOOKSTORE_TEST_DATABASE_URL` points at a
//! scratch `PostgreSQL` database; migrations are applied automatically.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use bookstore_api::db::UserRepository;
use bookstore_api::services::auth::{SignupInput, register, validate_signup};
use bookstore_api::services::inventory::{self, StockAlerts};
use bookstore_core::UserRole;
use bookstore_integration_tests::{TestApp, decimal, unique_email};

const PASSWORD: &str = "bookworm2024";

/// Create an admin directly and issue a token for it.
async fn admin_token(app: &TestApp) -> String {
    let input = SignupInput {
        name: "Test Admin".to_owned(),
        email: unique_email("admin"),
        password: PASSWORD.to_owned(),
        phone: None,
    };
    let valid = validate_signup(&input).unwrap();
    let admin = register(&UserRepository::new(app.pool()), &valid, UserRole::Admin)
        .await
        .unwrap();
    app.token_for(admin.id.as_i32(), UserRole::Admin)
}

/// Sign up a customer over HTTP and return (email, token).
async fn customer(app: &TestApp) -> (String, String) {
    let email = unique_email("reader");
    let (status, body) = app
        .post(
            "/api/auth/signup",
            None,
            &json!({"name": "Reader", "email": email, "password": PASSWORD}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    (email, body["token"].as_str().unwrap().to_owned())
}

/// Create a book with a fresh author; returns the book id.
async fn book(app: &TestApp, admin: &str, price: &str, stock: i32) -> i64 {
    let suffix = uuid::Uuid::new_v4().simple().to_string();

    let (status, author) = app
        .post(
            "/api/authors",
            Some(admin),
            &json!({"name": format!("Author {suffix}")}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{author}");

    let (status, created) = app
        .post(
            "/api/books",
            Some(admin),
            &json!({
                "title": format!("Book {suffix}"),
                "authorId": author["id"],
                "price": price,
                "stock": stock,
                "genre": "FICTION",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    created["id"].as_i64().unwrap()
}

async fn stock_of(app: &TestApp, book_id: i64) -> i64 {
    let (status, body) = app.get(&format!("/api/books/{book_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    body["stock"].as_i64().unwrap()
}

async fn add(app: &TestApp, token: &str, book_id: i64, quantity: u32) -> (StatusCode, Value) {
    app.patch(
        "/api/cart/add",
        Some(token),
        &json!({"bookId": book_id, "quantity": quantity}),
    )
    .await
}

// ============================================================================
// Accounts
// ============================================================================

#[tokio::test]
async fn test_signup_login_and_me() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let (email, token) = customer(&app).await;

    let (status, body) = app
        .post(
            "/api/auth/signup",
            None,
            &json!({"name": "Again", "email": email, "password": PASSWORD}),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "User already exists");

    let (status, body) = app
        .post(
            "/api/auth/login",
            None,
            &json!({"email": email, "password": "wrongpass99"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid email or password");

    let (status, body) = app
        .post(
            "/user/login",
            None,
            &json!({"email": email.to_uppercase(), "password": PASSWORD}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "CUSTOMER");

    let (status, me) = app.get("/api/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], email.as_str());
    assert_eq!(me["role"], "CUSTOMER");
}

// ============================================================================
// Cart
// ============================================================================

#[tokio::test]
async fn test_cart_add_and_remove() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let admin = admin_token(&app).await;
    let book_id = book(&app, &admin, "12.50", 3).await;
    let (_, token) = customer(&app).await;

    let (status, bag) = add(&app, &token, book_id, 2).await;
    assert_eq!(status, StatusCode::OK, "{bag}");
    assert_eq!(bag["totalItems"], 2);
    assert_eq!(decimal(&bag["totalAmount"]), Decimal::new(2500, 2));

    // 2 already in the bag, 3 in stock
    let (status, body) = add(&app, &token, book_id, 2).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().starts_with("Stock not enough"));

    let (status, _) = app
        .patch(
            "/api/cart/remove",
            Some(&token),
            &json!({"bookId": book_id, "quantity": 5}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Legacy path and snake_case field
    let (status, bag) = app
        .patch(
            "/shop/remove",
            Some(&token),
            &json!({"book_id": book_id, "quantity": 2}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bag["items"].as_array().unwrap().len(), 0);
    assert_eq!(decimal(&bag["totalAmount"]), Decimal::ZERO);

    let (status, _) = app
        .patch(
            "/api/cart/remove",
            Some(&token),
            &json!({"bookId": book_id, "quantity": 1}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Reading the cart never changes stock
    assert_eq!(stock_of(&app, book_id).await, 3);
}

#[tokio::test]
async fn test_bag_total_cannot_overflow() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let admin = admin_token(&app).await;
    let book_id = book(&app, &admin, "99999999.99", 5_000).await;
    let (_, token) = customer(&app).await;

    let (status, body) = add(&app, &token, book_id, 1_000).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(body["message"].as_str().unwrap().starts_with("Bag total cannot exceed"));

    // The failed add left the bag untouched
    let (status, bag) = app.get("/api/cart", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bag["totalItems"], 0);

    let (status, body) = app
        .post(
            "/api/cart/edit",
            Some(&token),
            &json!({"items": [{"bookId": book_id, "quantity": 2_000}]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, bag) = add(&app, &token, book_id, 100).await;
    assert_eq!(status, StatusCode::OK, "{bag}");
    assert_eq!(decimal(&bag["totalAmount"]), Decimal::new(999_999_999_900, 2));
}

#[tokio::test]
async fn test_cart_edit_and_clear() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let admin = admin_token(&app).await;
    let first = book(&app, &admin, "5.00", 10).await;
    let second = book(&app, &admin, "7.25", 10).await;
    let (_, token) = customer(&app).await;

    let (status, bag) = app
        .post(
            "/api/cart/edit",
            Some(&token),
            &json!({"items": [
                {"bookId": first, "quantity": 1},
                {"bookId": second, "quantity": 4},
                {"bookId": first, "quantity": 2},
            ]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{bag}");
    assert_eq!(bag["totalItems"], 7);
    assert_eq!(decimal(&bag["totalAmount"]), Decimal::new(4400, 2));

    let item_id = bag["items"][0]["itemId"].as_i64().unwrap();
    let (status, bag) = app
        .delete(&format!("/api/cart/items/{item_id}"), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bag["items"].as_array().unwrap().len(), 1);

    let (status, bag) = app.delete("/api/cart", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bag["totalItems"], 0);
}

// ============================================================================
// Checkout and orders
// ============================================================================

#[tokio::test]
async fn test_checkout_decrements_stock_and_empties_cart() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let admin = admin_token(&app).await;
    let book_id = book(&app, &admin, "9.99", 5).await;
    let (_, token) = customer(&app).await;

    let (status, body) = app
        .post("/api/checkout", Some(&token), &json!({"address": "1 Library Lane"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Cart Empty");

    add(&app, &token, book_id, 3).await;

    let (status, receipt) = app
        .post(
            "/order/checkout",
            Some(&token),
            &json!({"address": "1 Library Lane", "paymentMode": "CARD"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{receipt}");
    assert_eq!(decimal(&receipt["total"]), Decimal::new(2997, 2));
    assert_eq!(receipt["paymentMode"], "CARD");
    let number = receipt["orderNumber"].as_str().unwrap().to_owned();
    assert!(number.starts_with("ORD-"));

    assert_eq!(stock_of(&app, book_id).await, 2);

    let (_, bag) = app.get("/api/cart", Some(&token)).await;
    assert_eq!(bag["items"].as_array().unwrap().len(), 0);

    let (status, orders) = app.get("/api/orders", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        orders
            .as_array()
            .unwrap()
            .iter()
            .any(|o| o["orderNumber"] == number.as_str())
    );

    let (status, order) = app.get(&format!("/api/orders/{number}"), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "PROCESSING");
    assert_eq!(order["items"][0]["quantity"], 3);

    let (status, profile) = app.get("/api/profile", Some(&token)).await;
    assert_eq!(status, StatusCode::OK, "{profile}");
    assert!(profile["addresses"].as_array().unwrap().contains(&json!("1 Library Lane")));
}

#[tokio::test]
async fn test_cancel_restores_stock() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let admin = admin_token(&app).await;
    let book_id = book(&app, &admin, "20.00", 4).await;
    let (_, token) = customer(&app).await;
    let (_, stranger) = customer(&app).await;

    add(&app, &token, book_id, 4).await;
    let (_, receipt) = app
        .post("/api/checkout", Some(&token), &json!({"address": "2 Shelf St"}))
        .await;
    let number = receipt["orderNumber"].as_str().unwrap().to_owned();
    assert_eq!(stock_of(&app, book_id).await, 0);

    let (status, _) = app.get(&format!("/api/orders/{number}"), Some(&stranger)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post(&format!("/api/orders/{number}/cancel"), Some(&stranger), &json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, order) = app
        .post(&format!("/api/orders/{number}/cancel"), Some(&token), &json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{order}");
    assert_eq!(order["status"], "CANCELLED");
    assert_eq!(stock_of(&app, book_id).await, 4);

    let (status, _) = app
        .post(&format!("/api/orders/{number}/cancel"), Some(&token), &json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_admin_moves_order_through_statuses() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let admin = admin_token(&app).await;
    let book_id = book(&app, &admin, "3.00", 2).await;
    let (_, token) = customer(&app).await;

    add(&app, &token, book_id, 1).await;
    let (_, receipt) = app
        .post("/api/checkout", Some(&token), &json!({"address": "3 Index Rd"}))
        .await;
    let number = receipt["orderNumber"].as_str().unwrap().to_owned();
    let uri = format!("/api/admin/orders/{number}");

    let (status, order) = app.patch(&uri, Some(&admin), &json!({"status": "SHIPPED"})).await;
    assert_eq!(status, StatusCode::OK, "{order}");
    assert_eq!(order["status"], "SHIPPED");

    let (status, _) = app.patch(&uri, Some(&admin), &json!({"status": "CANCELLED"})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, order) = app.patch(&uri, Some(&admin), &json!({"status": "COMPLETED"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "COMPLETED");

    // Shipped stock stays sold
    assert_eq!(stock_of(&app, book_id).await, 1);

    let (status, listing) = app.get("/api/admin/orders", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(listing["total"].as_u64().unwrap() >= 1);

    // Legacy paths reach the same records
    let (status, order) = app.get(&format!("/order/{number}"), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "COMPLETED");

    let (status, listing) = app.get("/order", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(listing["total"].as_u64().unwrap() >= 1);

    let (status, detail) = app.get(&format!("/books/{book_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["stock"], 1);
}

#[tokio::test]
async fn test_concurrent_checkouts_never_oversell() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let admin = admin_token(&app).await;
    let book_id = book(&app, &admin, "15.00", 1).await;
    let (_, first) = customer(&app).await;
    let (_, second) = customer(&app).await;

    // Both bags hold the last copy
    assert_eq!(add(&app, &first, book_id, 1).await.0, StatusCode::OK);
    assert_eq!(add(&app, &second, book_id, 1).await.0, StatusCode::OK);

    let body = json!({"address": "4 Race Ave"});
    let ((a, _), (b, _)) = tokio::join!(
        app.post("/api/checkout", Some(&first), &body),
        app.post("/api/checkout", Some(&second), &body),
    );

    let mut statuses = [a, b];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::CONFLICT]);
    assert_eq!(stock_of(&app, book_id).await, 0);
}

// ============================================================================
// Dashboard and stock alerts
// ============================================================================

#[tokio::test]
async fn test_dashboard_and_low_stock() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let admin = admin_token(&app).await;
    let scarce = book(&app, &admin, "11.00", 1).await;

    let (status, dashboard) = app.get("/api/admin/dashboard", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK, "{dashboard}");
    assert!(dashboard["stats"]["totalBooks"].as_i64().unwrap() >= 1);
    assert!(dashboard["stockHistory"].is_array());

    let (status, low) = app
        .get("/api/admin/dashboard/low-stock?threshold=2&limit=100", Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(low.as_array().unwrap().iter().any(|b| b["id"] == scarce));

    let (status, adjusted) = app
        .patch(&format!("/api/books/{scarce}/stock?delta=-2"), Some(&admin), &json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{adjusted}");

    let (status, adjusted) = app
        .patch(&format!("/api/books/{scarce}/stock?delta=9"), Some(&admin), &json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(adjusted["stock"], 10);
}

#[tokio::test]
async fn test_watcher_publishes_scarce_books() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let admin = admin_token(&app).await;
    let scarce = book(&app, &admin, "4.00", 1).await;

    let alerts = StockAlerts::new();
    let mut receiver = alerts.subscribe();

    let count = inventory::check_once(app.pool(), &alerts, 2).await.unwrap();
    assert!(count >= 1);

    let alert = receiver.recv().await.unwrap();
    assert_eq!(alert.message, "Restock these books");
    assert!(alert.books.iter().any(|b| i64::from(b.id.as_i32()) == scarce));
    assert!(alerts.latest().await.is_some());
}
