// tests/common/mod.rs

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use licencia_backend::{
    config::Config,
    models::{
        question::NewQuestion,
        user::{NewUser, Role},
    },
    routes,
    state::AppState,
    store::{DynStore, MemoryStore, PgStore, Store},
    utils::hash::hash_password,
};
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;

pub const JWT_SECRET: &str = "test_secret_for_integration_tests";
pub const EVENTS_SECRET: &str = "test_events_secret";
pub const INTEGRITY_SECRET: &str = "test_integrity_secret";
pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub address: String,
    pub store: DynStore,
    pub client: reqwest::Client,
}

pub fn test_config() -> Config {
    Config {
        database_url: String::new(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        admin_email: None,
        admin_password: None,
        payment_events_secret: EVENTS_SECRET.to_string(),
        payment_integrity_secret: INTEGRITY_SECRET.to_string(),
        payment_public_key: "pub_test_key".to_string(),
        app_base_url: "http://localhost:5173/".to_string(),
        pro_grant_days: 120,
        local_utc_offset_hours: -5,
        auth_rate_per_second: 1,
        auth_rate_burst: 1000,
        cors_origins: vec!["http://localhost:5173".to_string()],
    }
}

/// Spawns the app on a random port, backed by a fresh in-memory store.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

pub async fn spawn_app_with(config: Config) -> TestApp {
    serve(Arc::new(MemoryStore::new()), config).await
}

/// Spawns the app on PostgreSQL when `DATABASE_URL` is set, after running
/// the migrations. Returns `None` otherwise so callers can skip.
pub async fn spawn_pg_app() -> Option<TestApp> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping PostgreSQL test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url,
        ..test_config()
    };
    Some(serve(Arc::new(PgStore::new(pool)), config).await)
}

async fn serve(store: DynStore, config: Config) -> TestApp {
    let state = AppState {
        store: store.clone(),
        config,
    };
    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        store,
        client: reqwest::Client::new(),
    }
}

pub fn unique_email() -> String {
    format!("u_{}@example.com", &uuid::Uuid::new_v4().to_string()[..8])
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Registers through the API and returns `(user_id, token)`.
    pub async fn register_and_login(&self) -> (i64, String) {
        let email = unique_email();
        let res = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({ "email": email, "name": "Test Driver", "password": PASSWORD }))
            .send()
            .await
            .expect("Register failed");
        assert_eq!(res.status().as_u16(), 201);
        let user: Value = res.json().await.unwrap();
        let token = self.login(&email).await;
        (user["id"].as_i64().unwrap(), token)
    }

    /// Inserts a user with `role` straight into the store and logs in.
    pub async fn user_with_role(&self, role: Role) -> (i64, String) {
        let email = unique_email();
        let user = self
            .store
            .create_user(NewUser {
                email: email.clone(),
                name: role.as_str().to_string(),
                password_hash: hash_password(PASSWORD).unwrap(),
                role,
            })
            .await
            .unwrap();
        (user.id, self.login(&email).await)
    }

    pub async fn login(&self, email: &str) -> String {
        let body: Value = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": PASSWORD }))
            .send()
            .await
            .expect("Login failed")
            .json()
            .await
            .expect("Failed to parse login json");
        body["token"].as_str().expect("Token not found").to_string()
    }

    /// Seeds `n` four-option questions whose correct answer is index 0.
    pub async fn seed_questions(&self, category: &str, evaluation_id: Option<i64>, n: usize) {
        for i in 0..n {
            self.store
                .create_question(NewQuestion {
                    category: category.to_string(),
                    text: format!("{} question {}", category, i),
                    options: vec!["right".into(), "wrong 1".into(), "wrong 2".into(), "wrong 3".into()],
                    correct_answer: 0,
                    evaluation_id,
                })
                .await
                .unwrap();
        }
    }

    pub async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn delete(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }
}
