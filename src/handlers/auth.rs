// src/handlers/auth.rs

use axum::{
    Json,
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    handlers::current_user,
    models::user::{LoginRequest, NewUser, RegisterRequest, Role},
    store::DynStore,
    utils::{
        hash::{hash_password, verify_password},
        jwt::{Claims, sign_jwt},
    },
};

/// Registers a new user.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(store): State<DynStore>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let email = payload.email.trim().to_lowercase();
    let password_hash = hash_password(&payload.password)?;

    let user = store
        .create_user(NewUser {
            email,
            name: payload.name.trim().to_string(),
            password_hash,
            role: Role::User,
        })
        .await?;

    tracing::info!(user_id = user.id, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Authenticates a user and returns a JWT token.
///
/// Unknown emails and wrong passwords get the same answer.
pub async fn login(
    State(store): State<DynStore>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let invalid = || AppError::AuthError("Invalid email or password".to_string());

    let user = store
        .find_user_by_email(&payload.email.trim().to_lowercase())
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(invalid());
    }

    let token = sign_jwt(user.id, user.role(), &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "user": user.with_effective_pro(Utc::now()),
    })))
}

/// Returns the caller with Pro status as of now.
pub async fn me(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = current_user(store.as_ref(), &claims).await?;
    Ok(Json(user.with_effective_pro(Utc::now())))
}
