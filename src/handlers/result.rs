// src/handlers/result.rs

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    exam::scoring,
    models::{
        exam_result::{ResultListParams, ResultResponse},
        user::Role,
    },
    store::DynStore,
    utils::jwt::Claims,
};

/// Lists the caller's own results, newest first.
pub async fn list_my_results(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<ResultListParams>,
) -> Result<impl IntoResponse, AppError> {
    let results = store
        .list_results(Some(claims.user_id()?), params.category.as_deref())
        .await?;
    Ok(Json(results))
}

/// One result with its review. Other users' results look missing,
/// except to a global admin.
pub async fn get_result(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let not_found = || AppError::NotFound("Result not found".to_string());

    let result = store.find_result(id).await?.ok_or_else(not_found)?;
    if result.user_id != claims.user_id()? && claims.role() != Role::Admin {
        return Err(not_found());
    }

    let review = match store.find_session_by_result(result.id).await? {
        Some(session) => scoring::review(&session),
        None => Vec::new(),
    };

    Ok(Json(ResultResponse { result, review }))
}
