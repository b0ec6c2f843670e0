// src/handlers/mod.rs

pub mod admin;
pub mod auth;
pub mod evaluation;
pub mod exam;
pub mod payment;
pub mod result;
pub mod settings;

use crate::{error::AppError, models::user::User, store::Store, utils::jwt::Claims};

/// Loads the caller's user row. A token for a deleted user is rejected.
pub(crate) async fn current_user(store: &dyn Store, claims: &Claims) -> Result<User, AppError> {
    store
        .find_user(claims.user_id()?)
        .await?
        .ok_or(AppError::AuthError("User no longer exists".to_string()))
}
