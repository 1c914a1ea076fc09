//! API tests against a running server.
//!
//! Start the server with `LIBRARY__AUTH__ADMIN_REGISTRATION_KEY` set to the
//! same value as `ADMIN_KEY` (default `test-admin-key`), then run
//! `cargo test -- --ignored`.

use reqwest::Client;
use serde_json::{json, Value};
use uuid::Uuid;

const BASE_URL: &str = "http://localhost:8080/api/v1";

fn admin_key() -> String {
    std::env::var("ADMIN_KEY").unwrap_or_else(|_| "test-admin-key".to_string())
}

/// Register a fresh account and return its bearer token
async fn register_and_login(client: &Client, admin: bool) -> String {
    let username = format!("it-{}", &Uuid::new_v4().simple().to_string()[..12]);
    let password = "integration-password";

    let path = if admin { "auth/register-admin" } else { "auth/register" };
    let response = client
        .post(format!("{}/{}", BASE_URL, path))
        .header("X-Admin-Key", admin_key())
        .json(&json!({
            "username": username,
            "email": format!("{}@example.org", username),
            "password": password
        }))
        .send()
        .await
        .expect("Failed to send register request");
    assert_eq!(response.status(), 201);

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Failed to send login request");

    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().expect("No token in response").to_string()
}

async fn create_book(client: &Client, admin_token: &str) -> Value {
    let response = client
        .post(format!("{}/books", BASE_URL))
        .header("Authorization", format!("Bearer {}", admin_token))
        .json(&json!({
            "title": "Structure and Interpretation of Computer Programs",
            "author": "Abelson & Sussman",
            "published_year": 1985
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);
    response.json().await.expect("Failed to parse response")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_ready_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 200);
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "username": "nobody-here",
            "password": "wrong-password"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_get_current_user() {
    let client = Client::new();
    let token = register_and_login(&client, false).await;

    let response = client
        .get(format!("{}/users/me", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["role"], "user");
}

#[tokio::test]
#[ignore]
async fn test_borrow_and_return() {
    let client = Client::new();
    let admin = register_and_login(&client, true).await;
    let reader = register_and_login(&client, false).await;
    let book = create_book(&client, &admin).await;

    let response = client
        .post(format!("{}/bookings", BASE_URL))
        .header("Authorization", format!("Bearer {}", reader))
        .json(&json!({ "book_id": book["id"], "borrow_days": 14 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let booking: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(booking["status"], "ACTIVE");

    // Second borrow of the same book while active
    let response = client
        .post(format!("{}/bookings", BASE_URL))
        .header("Authorization", format!("Bearer {}", reader))
        .json(&json!({ "book_id": book["id"], "borrow_days": 7 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);

    let booking_id = booking["id"].as_str().expect("No booking ID");
    let response = client
        .post(format!("{}/bookings/{}/return", BASE_URL, booking_id))
        .header("Authorization", format!("Bearer {}", reader))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);
    let returned: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(returned["status"], "RETURNED");

    let response = client
        .post(format!("{}/bookings/{}/return", BASE_URL, booking_id))
        .header("Authorization", format!("Bearer {}", reader))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[ignore]
async fn test_stale_book_update_conflicts() {
    let client = Client::new();
    let admin = register_and_login(&client, true).await;
    let book = create_book(&client, &admin).await;
    let id = book["id"].as_str().expect("No book ID");

    let response = client
        .put(format!("{}/books/{}", BASE_URL, id))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&json!({ "title": "Second edition", "version": 1 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);

    let response = client
        .put(format!("{}/books/{}", BASE_URL, id))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&json!({ "title": "Lost update", "version": 1 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[ignore]
async fn test_unauthorized_access() {
    let client = Client::new();

    let response = client
        .get(format!("{}/bookings", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}
