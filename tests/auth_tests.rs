// tests/auth_tests.rs

mod common;

use common::{PASSWORD, spawn_app, test_config, unique_email};
use serde_json::{Value, json};

#[tokio::test]
async fn health_check_404() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_works_and_hides_password() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({ "email": "New.Driver@Example.com", "name": "Ana", "password": PASSWORD }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);
    let user: Value = response.json().await.unwrap();
    assert_eq!(user["email"], "new.driver@example.com");
    assert_eq!(user["role"], "user");
    assert_eq!(user["is_pro"], false);
    assert!(user.get("password").is_none());
}

#[tokio::test]
async fn register_fails_validation() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({ "email": "not-an-email", "name": "Ana", "password": "short" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let app = spawn_app().await;
    let email = unique_email();
    let body = json!({ "email": email, "name": "Ana", "password": PASSWORD });

    let first = app.client.post(app.url("/api/auth/register")).json(&body).send().await.unwrap();
    assert_eq!(first.status().as_u16(), 201);

    let second = app.client.post(app.url("/api/auth/register")).json(&body).send().await.unwrap();
    assert_eq!(second.status().as_u16(), 409);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = spawn_app().await;
    let email = unique_email();
    app.client
        .post(app.url("/api/auth/register"))
        .json(&json!({ "email": email, "name": "Ana", "password": PASSWORD }))
        .send()
        .await
        .unwrap();

    let response = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "email": email, "password": "not-the-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn me_returns_current_user() {
    let app = spawn_app().await;
    let (id, token) = app.register_and_login().await;

    let response = app.get("/api/auth/me", &token).await;
    assert_eq!(response.status().as_u16(), 200);
    let me: Value = response.json().await.unwrap();
    assert_eq!(me["id"].as_i64(), Some(id));

    let anonymous = app.client.get(app.url("/api/auth/me")).send().await.unwrap();
    assert_eq!(anonymous.status().as_u16(), 401);
}

#[tokio::test]
async fn auth_routes_are_rate_limited() {
    let mut config = test_config();
    config.auth_rate_per_second = 60;
    config.auth_rate_burst = 2;
    let app = common::spawn_app_with(config).await;

    let body = json!({ "email": "nobody@example.com", "password": PASSWORD });
    let mut statuses = Vec::new();
    for _ in 0..4 {
        let res = app.client.post(app.url("/api/auth/login")).json(&body).send().await.unwrap();
        statuses.push(res.status().as_u16());
    }

    assert_eq!(&statuses[..2], &[401, 401]);
    assert!(statuses[2..].contains(&429));
}
