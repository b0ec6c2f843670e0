// src/handlers/exam.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    exam::{self, scoring},
    handlers::current_user,
    models::{
        category::Category,
        exam_result::ResultResponse,
        exam_session::{Answers, AnswerRequest, SessionResponse, StartExamRequest, SubmitExamRequest},
    },
    store::DynStore,
    utils::jwt::Claims,
};

/// Starts an exam in a standard category or a custom evaluation.
///
/// Non-Pro users are held to one standard exam per local day; the
/// rejection carries a redirect hint for the client.
pub async fn start_exam(
    State(store): State<DynStore>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<StartExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let category: Category = payload.category.parse()?;
    let user = current_user(store.as_ref(), &claims).await?;

    let now = Utc::now();
    let session = exam::start_exam(store.as_ref(), &config, &user, category, now).await?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse::from_session(&session, now)),
    ))
}

/// Current state of one of the caller's sessions.
pub async fn get_session(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let session = exam::load_session(store.as_ref(), claims.user_id()?, id, now).await?;
    Ok(Json(SessionResponse::from_session(&session, now)))
}

/// Records or overwrites one answer.
pub async fn answer_question(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let session = exam::load_session(store.as_ref(), claims.user_id()?, id, now).await?;

    let answers = Answers::from([(payload.question_id, payload.answer)]);
    exam::record_answers(store.as_ref(), &session, &answers, now).await?;

    Ok(Json(json!({
        "question_id": payload.question_id,
        "answer": payload.answer,
        "remaining_seconds": session.remaining_seconds(now),
    })))
}

/// Finishes the exam and returns the graded result with its review.
pub async fn submit_exam(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<SubmitExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let session = exam::load_session(store.as_ref(), claims.user_id()?, id, now).await?;
    let result = exam::submit_exam(store.as_ref(), &session, &payload.answers, now).await?;

    let review = match store.find_session(session.id).await? {
        Some(finished) => scoring::review(&finished),
        None => Vec::new(),
    };

    Ok(Json(ResultResponse { result, review }))
}
