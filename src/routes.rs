// src/routes.rs

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::Config,
    handlers::{admin, auth, evaluation, exam, payment, result, settings},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Assembles the main application router.
///
/// * Public: registration, login, the Pro price and the payment webhook.
/// * Authenticated: exams, results, evaluations and checkout.
/// * Admin: everything under `/api/admin`.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    let mut auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    // Login and registration are throttled per client IP.
    match GovernorConfigBuilder::default()
        .per_second(state.config.auth_rate_per_second)
        .burst_size(state.config.auth_rate_burst)
        .finish()
    {
        Some(governor_conf) => {
            auth_routes = auth_routes.layer(GovernorLayer::new(Arc::new(governor_conf)));
        }
        None => tracing::warn!("Invalid auth rate limit settings, rate limiting disabled"),
    }

    let auth_routes = auth_routes.merge(
        Router::new()
            .route("/me", get(auth::me))
            .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
    );

    let exam_routes = Router::new()
        .route("/start", post(exam::start_exam))
        .route("/{id}", get(exam::get_session))
        .route("/{id}/answers", put(exam::answer_question))
        .route("/{id}/submit", post(exam::submit_exam));

    let result_routes = Router::new()
        .route("/", get(result::list_my_results))
        .route("/{id}", get(result::get_result));

    let payment_routes = Router::new()
        .route("/checkout", post(payment::checkout))
        .route("/signature", post(payment::sign));

    let user_routes = Router::new()
        .nest("/exams", exam_routes)
        .nest("/results", result_routes)
        .nest("/payments", payment_routes)
        .route("/evaluations", get(evaluation::list_evaluations))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let public_routes = Router::new()
        .route("/settings/pro-price", get(settings::get_pro_price))
        .route("/payments/webhook", post(payment::webhook));

    let admin_routes = Router::new()
        .route(
            "/questions",
            get(admin::list_questions).post(admin::create_question),
        )
        .route(
            "/questions/{id}",
            put(admin::update_question).delete(admin::delete_question),
        )
        .route(
            "/evaluations",
            get(admin::list_evaluations).post(admin::create_evaluation),
        )
        .route(
            "/evaluations/{id}",
            put(admin::update_evaluation).delete(admin::delete_evaluation),
        )
        .route("/users", get(admin::list_users))
        .route(
            "/users/{id}",
            put(admin::update_user).delete(admin::delete_user),
        )
        .route(
            "/users/{id}/pro",
            post(admin::grant_user_pro).delete(admin::revoke_user_pro),
        )
        .route("/payments", get(admin::list_payments))
        .route("/results", get(admin::list_results))
        .route(
            "/settings/pro-price",
            get(admin::get_pro_price).put(admin::update_pro_price),
        )
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/admin", admin_routes)
        .merge(user_routes)
        .merge(public_routes);

    Router::new()
        .nest("/api", api_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use crate::{models::user::Role, store::MemoryStore, utils::jwt::sign_jwt};

    fn config() -> Config {
        Config {
            database_url: String::new(),
            jwt_secret: "router-secret".into(),
            jwt_expiration: 600,
            rust_log: "error".into(),
            bind_addr: "127.0.0.1:0".into(),
            admin_email: None,
            admin_password: None,
            payment_events_secret: "events".into(),
            payment_integrity_secret: "integrity".into(),
            payment_public_key: "pub_test".into(),
            app_base_url: "http://localhost:5173".into(),
            pro_grant_days: 120,
            local_utc_offset_hours: -5,
            auth_rate_per_second: 1,
            auth_rate_burst: 100,
            cors_origins: vec!["http://localhost:5173".into()],
        }
    }

    fn app() -> Router {
        create_router(AppState::new(MemoryStore::new(), config()))
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn pro_price_is_public() {
        let res = app().oneshot(get("/api/settings/pro-price", None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn exam_routes_need_a_token() {
        let res = app().oneshot(get("/api/exams/1", None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app().oneshot(get("/api/results", Some("garbage"))).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_routes_reject_plain_users() {
        let token = sign_jwt(1, Role::User, "router-secret", 60).unwrap();
        let res = app().oneshot(get("/api/admin/users", Some(&token))).await.unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn tenant_admins_cannot_read_the_payment_ledger() {
        let token = sign_jwt(1, Role::AdminSupertaxis, "router-secret", 60).unwrap();
        let res = app().oneshot(get("/api/admin/payments", Some(&token))).await.unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }
}
