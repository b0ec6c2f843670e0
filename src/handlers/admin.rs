// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    billing::entitlement::{grant_pro, revoke_pro, sweep_expired},
    config::{Config, PRO_PRICE_SETTING_KEY},
    error::AppError,
    handlers::settings::pro_price,
    models::{
        category::Category,
        evaluation::{CreateEvaluationRequest, UpdateEvaluationRequest},
        exam_result::ResultListParams,
        question::{
            CreateQuestionRequest, NewQuestion, QuestionListParams, UpdateQuestionRequest,
            check_answer_index,
        },
        setting::{ProPriceResponse, UpdateProPriceRequest},
        user::{AdminUpdateUserRequest, GrantProRequest, Role, User},
    },
    store::{DynStore, QuestionPatch, Store},
    utils::{html::clean_html, jwt::Claims},
};

// ---- access helpers ----

fn require_global_admin(role: Role) -> Result<(), AppError> {
    if role != Role::Admin {
        return Err(AppError::Forbidden("Global administrators only".to_string()));
    }
    Ok(())
}

/// Standard banks belong to global admins. Evaluation banks follow the
/// evaluation's tenant.
async fn ensure_bank_access(
    store: &dyn Store,
    role: Role,
    category: Category,
) -> Result<(), AppError> {
    match category {
        Category::Standard(_) => require_global_admin(role),
        Category::Evaluation(id) => {
            let evaluation = store
                .find_evaluation(id)
                .await?
                .ok_or(AppError::NotFound("Evaluation not found".to_string()))?;
            if !evaluation.manageable_by(role) {
                return Err(AppError::Forbidden(
                    "Evaluation belongs to another company".to_string(),
                ));
            }
            Ok(())
        }
    }
}

/// Tenant admins only reach users of their own tenant.
fn ensure_user_access(actor: Role, target: &User) -> Result<(), AppError> {
    match actor {
        Role::Admin => Ok(()),
        Role::AdminSupertaxis if target.role().company_tag() == actor.company_tag() => Ok(()),
        _ => Err(AppError::Forbidden("User belongs to another company".to_string())),
    }
}

async fn find_user_or_404(store: &dyn Store, id: i64) -> Result<User, AppError> {
    store
        .find_user(id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))
}

// ---- questions ----

/// Lists questions. Tenant admins must name one of their evaluations.
pub async fn list_questions(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<QuestionListParams>,
) -> Result<impl IntoResponse, AppError> {
    let role = claims.role();
    let category = match params.category.as_deref() {
        Some(raw) => {
            let category: Category = raw.parse()?;
            ensure_bank_access(store.as_ref(), role, category).await?;
            Some(category.to_string())
        }
        None => {
            require_global_admin(role)?;
            None
        }
    };

    let questions = store.list_questions(category.as_deref()).await?;
    Ok(Json(questions))
}

/// Creates a question. Text and options are sanitized before storage.
pub async fn create_question(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    check_answer_index(&payload.options, payload.correct_answer)?;

    let category: Category = payload.category.parse()?;
    ensure_bank_access(store.as_ref(), claims.role(), category).await?;

    let question = store
        .create_question(NewQuestion {
            category: category.to_string(),
            text: clean_html(&payload.text),
            options: payload.options.iter().map(|o| clean_html(o)).collect(),
            correct_answer: payload.correct_answer,
            evaluation_id: category.evaluation_id(),
        })
        .await?;

    tracing::info!(question_id = question.id, category = %question.category, "Question created");
    Ok((StatusCode::CREATED, Json(question)))
}

/// Updates a question. Moving it requires access to both banks.
pub async fn update_question(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let role = claims.role();

    let existing = store
        .find_question(id)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;
    ensure_bank_access(store.as_ref(), role, existing.category.parse()?).await?;

    if payload.is_empty() {
        return Ok(Json(existing));
    }

    let options = payload.options.as_ref().unwrap_or(&existing.options.0);
    let correct_answer = payload.correct_answer.unwrap_or(existing.correct_answer);
    check_answer_index(options, correct_answer)?;

    let mut patch = QuestionPatch {
        text: payload.text.as_deref().map(clean_html),
        options: payload
            .options
            .as_ref()
            .map(|opts| opts.iter().map(|o| clean_html(o)).collect()),
        correct_answer: payload.correct_answer,
        ..Default::default()
    };

    if let Some(raw) = payload.category.as_deref() {
        let category: Category = raw.parse()?;
        ensure_bank_access(store.as_ref(), role, category).await?;
        patch.category = Some(category.to_string());
        patch.evaluation_id = Some(category.evaluation_id());
    }

    let question = store
        .update_question(id, patch)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;
    Ok(Json(question))
}

pub async fn delete_question(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let existing = store
        .find_question(id)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;
    ensure_bank_access(store.as_ref(), claims.role(), existing.category.parse()?).await?;

    if !store.delete_question(id).await? {
        return Err(AppError::NotFound("Question not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---- evaluations ----

/// Evaluations the caller may manage, active or not.
pub async fn list_evaluations(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let role = claims.role();
    let evaluations: Vec<_> = store
        .list_evaluations()
        .await?
        .into_iter()
        .filter(|e| e.manageable_by(role))
        .collect();
    Ok(Json(evaluations))
}

/// Creates an evaluation. Tenant admins always create inside their tenant.
pub async fn create_evaluation(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Json(mut payload): Json<CreateEvaluationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let role = claims.role();
    if role != Role::Admin {
        payload.company_tag = role.company_tag().map(str::to_string);
    }

    let evaluation = store.create_evaluation(payload).await?;
    tracing::info!(evaluation_id = evaluation.id, "Evaluation created");
    Ok((StatusCode::CREATED, Json(evaluation)))
}

pub async fn update_evaluation(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateEvaluationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let existing = store
        .find_evaluation(id)
        .await?
        .ok_or(AppError::NotFound("Evaluation not found".to_string()))?;
    if !existing.manageable_by(claims.role()) {
        return Err(AppError::Forbidden(
            "Evaluation belongs to another company".to_string(),
        ));
    }
    if payload.is_empty() {
        return Ok(Json(existing));
    }

    let evaluation = store
        .update_evaluation(id, payload)
        .await?
        .ok_or(AppError::NotFound("Evaluation not found".to_string()))?;
    Ok(Json(evaluation))
}

/// Deletes an evaluation together with its questions.
pub async fn delete_evaluation(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let existing = store
        .find_evaluation(id)
        .await?
        .ok_or(AppError::NotFound("Evaluation not found".to_string()))?;
    if !existing.manageable_by(claims.role()) {
        return Err(AppError::Forbidden(
            "Evaluation belongs to another company".to_string(),
        ));
    }

    store.delete_evaluation(id).await?;
    tracing::info!(evaluation_id = id, "Evaluation deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---- users ----

/// Lists users, clearing lapsed Pro grants first.
pub async fn list_users(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let role = claims.role();
    sweep_expired(store.as_ref(), Utc::now()).await?;

    let users: Vec<User> = store
        .list_users()
        .await?
        .into_iter()
        .filter(|u| ensure_user_access(role, u).is_ok())
        .collect();
    Ok(Json(users))
}

/// Changes a user's name or role.
pub async fn update_user(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let actor = claims.role();

    let target = find_user_or_404(store.as_ref(), id).await?;
    ensure_user_access(actor, &target)?;

    let role = match payload.role.as_deref() {
        Some(raw) => {
            let role = Role::parse(raw)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown role '{}'", raw)))?;
            if actor != Role::Admin && role.company_tag() != actor.company_tag() {
                return Err(AppError::Forbidden(
                    "Cannot assign a role outside your company".to_string(),
                ));
            }
            if id == claims.user_id()? && role != target.role() {
                return Err(AppError::BadRequest("Cannot change your own role".to_string()));
            }
            Some(role)
        }
        None => None,
    };

    let user = store
        .update_user(id, payload.name.map(|n| n.trim().to_string()), role)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;
    Ok(Json(user.with_effective_pro(Utc::now())))
}

/// Deletes a user by ID. Prevents deleting self.
pub async fn delete_user(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if id == claims.user_id()? {
        return Err(AppError::BadRequest("Cannot delete yourself".to_string()));
    }

    let target = find_user_or_404(store.as_ref(), id).await?;
    ensure_user_access(claims.role(), &target)?;

    if !store.delete_user(id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    tracing::info!(user_id = id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Manual Pro grant. `days` defaults to the configured grant period.
pub async fn grant_user_pro(
    State(store): State<DynStore>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    payload: Option<Json<GrantProRequest>>,
) -> Result<impl IntoResponse, AppError> {
    // A body-less request grants the configured period.
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    payload.validate()?;

    let target = find_user_or_404(store.as_ref(), id).await?;
    ensure_user_access(claims.role(), &target)?;

    let days = payload.days.unwrap_or(config.pro_grant_days);
    let user = grant_pro(store.as_ref(), id, days, Utc::now())
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;
    Ok(Json(user))
}

pub async fn revoke_user_pro(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let target = find_user_or_404(store.as_ref(), id).await?;
    ensure_user_access(claims.role(), &target)?;

    let user = revoke_pro(store.as_ref(), id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;
    Ok(Json(user))
}

// ---- payments, results, settings ----

pub async fn list_payments(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    require_global_admin(claims.role())?;
    Ok(Json(store.list_payments().await?))
}

pub async fn list_results(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<ResultListParams>,
) -> Result<impl IntoResponse, AppError> {
    require_global_admin(claims.role())?;
    let results = store
        .list_results(params.user_id, params.category.as_deref())
        .await?;
    Ok(Json(results))
}

pub async fn get_pro_price(
    State(store): State<DynStore>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(ProPriceResponse {
        pro_price_cop: pro_price(store.as_ref()).await?,
    }))
}

pub async fn update_pro_price(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateProPriceRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_global_admin(claims.role())?;
    payload.validate()?;

    store
        .put_setting(PRO_PRICE_SETTING_KEY, payload.pro_price_cop)
        .await?;
    tracing::info!(pro_price_cop = payload.pro_price_cop, "Pro price updated");
    Ok(Json(ProPriceResponse {
        pro_price_cop: payload.pro_price_cop,
    }))
}
