//! In-process HTTP tests: the full router over the in-memory store

use std::{sync::Arc, time::Duration};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use library_bookings::{
    api, config::AppConfig, repository::Repository, services::observer::NoopObserver,
    services::Services, AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt;

const ADMIN_KEY: &str = "http-test-admin-key";

fn app() -> Router {
    let mut config = AppConfig::default();
    config.auth.admin_registration_key = Some(ADMIN_KEY.to_string());

    let repository = Repository::in_memory();
    let services = Services::new(
        &repository,
        config.auth.clone(),
        Duration::from_secs(5),
        Arc::new(NoopObserver),
    );

    api::router(AppState {
        config: Arc::new(config),
        services: Arc::new(services),
        repository,
    })
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn register_admin(app: &Router, username: &str) -> String {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/auth/register-admin")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Admin-Key", ADMIN_KEY)
        .body(Body::from(
            json!({
                "username": username,
                "email": format!("{}@example.org", username),
                "password": "admin password 123"
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    login(app, username, "admin password 123").await
}

async fn register_user(app: &Router, username: &str) -> String {
    let (status, _) = send(
        app,
        Method::POST,
        "/api/v1/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{}@example.org", username),
            "password": "reader password 123"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    login(app, username, "reader password 123").await
}

async fn login(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    body["token"].as_str().unwrap().to_string()
}

async fn create_book(app: &Router, admin: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/books",
        Some(admin),
        Some(json!({ "title": "Neuromancer", "author": "William Gibson", "published_year": 1984 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["version"], 1);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_responds_with_request_id() {
    let app = app();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let (status, body) = send(&app, Method::GET, "/api/v1/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn refresh_exchanges_a_valid_token_for_a_new_one() {
    let app = app();
    let token = register_user(&app, "dixie").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "token": token })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["user"]["username"], "dixie");
    assert!(body["expires_at"].is_string());
    let refreshed = body["token"].as_str().unwrap().to_string();

    let (status, me) = send(&app, Method::GET, "/api/v1/users/me", Some(&refreshed), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "dixie");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "token": "garbage" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 2);
}

#[tokio::test]
async fn borrow_return_lifecycle_over_http() {
    let app = app();
    let admin = register_admin(&app, "librarian").await;
    let reader = register_user(&app, "case").await;
    let book_id = create_book(&app, &admin).await;

    let (status, booking) = send(
        &app,
        Method::POST,
        "/api/v1/bookings",
        Some(&reader),
        Some(json!({ "book_id": book_id, "borrow_days": 14 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["status"], "ACTIVE");
    let booking_id = booking["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/bookings",
        Some(&reader),
        Some(json!({ "book_id": book_id, "borrow_days": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 5);

    let (status, mine) = send(&app, Method::GET, "/api/v1/bookings", Some(&reader), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let return_uri = format!("/api/v1/bookings/{}/return", booking_id);
    let (status, returned) = send(&app, Method::POST, &return_uri, Some(&reader), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(returned["status"], "RETURNED");

    let (status, body) = send(&app, Method::POST, &return_uri, Some(&reader), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "AlreadyReturned");
}

#[tokio::test]
async fn out_of_range_borrow_days_are_a_bad_request() {
    let app = app();
    let admin = register_admin(&app, "root").await;
    let reader = register_user(&app, "molly").await;
    let book_id = create_book(&app, &admin).await;

    for days in [0, 31] {
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/bookings",
            Some(&reader),
            Some(json!({ "book_id": book_id, "borrow_days": days })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "borrow_days = {}", days);
    }
}

#[tokio::test]
async fn users_cannot_see_or_return_each_others_bookings() {
    let app = app();
    let admin = register_admin(&app, "boss").await;
    let owner = register_user(&app, "armitage").await;
    let other = register_user(&app, "riviera").await;
    let book_id = create_book(&app, &admin).await;

    let (_, booking) = send(
        &app,
        Method::POST,
        "/api/v1/bookings",
        Some(&owner),
        Some(json!({ "book_id": book_id, "borrow_days": 5 })),
    )
    .await;
    let uri = format!("/api/v1/bookings/{}", booking["id"].as_str().unwrap());

    let (status, _) = send(&app, Method::GET, &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::POST, &format!("{}/return", uri), Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::GET, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn catalog_writes_need_an_admin() {
    let app = app();
    let reader = register_user(&app, "wintermute").await;
    let payload = json!({ "title": "Count Zero", "author": "William Gibson" });

    let (status, _) = send(&app, Method::POST, "/api/v1/books", None, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::POST, "/api/v1/books", Some(&reader), Some(payload)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::GET, "/api/v1/admin/bookings", Some(&reader), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn book_update_with_stale_version_conflicts() {
    let app = app();
    let admin = register_admin(&app, "editor").await;
    let book_id = create_book(&app, &admin).await;
    let uri = format!("/api/v1/books/{}", book_id);

    let (status, body) = send(
        &app,
        Method::PUT,
        &uri,
        Some(&admin),
        Some(json!({ "title": "Neuromancer (2nd ed.)", "version": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], 2);
    assert_eq!(body["author"], "William Gibson");

    let (status, _) = send(
        &app,
        Method::PUT,
        &uri,
        Some(&admin),
        Some(json!({ "title": "Lost update", "version": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn pagination_bounds_are_enforced() {
    let app = app();

    for query in ["limit=0", "limit=101", "offset=-1"] {
        let (status, _) = send(&app, Method::GET, &format!("/api/v1/books?{}", query), None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", query);
    }

    let (status, body) = send(&app, Method::GET, "/api/v1/books?limit=100&offset=0", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn admin_registration_needs_the_key() {
    let app = app();

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/auth/register-admin",
        None,
        Some(json!({
            "username": "intruder",
            "email": "intruder@example.org",
            "password": "let me in please"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_can_sweep_and_manage_users() {
    let app = app();
    let admin = register_admin(&app, "sysop").await;
    register_user(&app, "finn").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/admin/bookings/mark-overdue",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transitioned"], 0);

    let (status, users) = send(&app, Method::GET, "/api/v1/admin/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let finn = users
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["username"] == "finn")
        .unwrap()
        .clone();
    assert!(finn.get("password_hash").is_none());

    let uri = format!("/api/v1/admin/users/{}", finn["id"].as_str().unwrap());
    let (status, _) = send(&app, Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
