// src/handlers/evaluation.rs

use axum::{
    Json,
    extract::{Extension, State},
    response::IntoResponse,
};

use crate::{error::AppError, store::DynStore, utils::jwt::Claims};

/// Active evaluations the caller may take.
pub async fn list_evaluations(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let role = claims.role();
    let evaluations: Vec<_> = store
        .list_evaluations()
        .await?
        .into_iter()
        .filter(|e| e.is_active && e.accessible_by(role))
        .collect();
    Ok(Json(evaluations))
}
