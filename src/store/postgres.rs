// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json};

use super::{Grader, QuestionPatch, Store};
use crate::{
    error::AppError,
    models::{
        evaluation::{CreateEvaluationRequest, Evaluation, UpdateEvaluationRequest},
        exam_result::{ExamResult, NewExamResult},
        exam_session::{Answers, ExamSession, NewExamSession},
        payment::{NewPayment, Payment},
        question::{NewQuestion, Question},
        user::{NewUser, Role, User},
    },
};

/// `Store` backed by PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, new: NewUser) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, name, password, role)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&new.email)
        .bind(&new.name)
        .bind(&new.password_hash)
        .bind(new.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Email '{}' is already registered", new.email))
            } else {
                tracing::error!("Failed to create user: {:?}", e);
                AppError::from(e)
            }
        })
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list users: {:?}", e);
                AppError::InternalServerError(e.to_string())
            })?;
        Ok(users)
    }

    async fn update_user(
        &self,
        id: i64,
        name: Option<String>,
        role: Option<Role>,
    ) -> Result<Option<User>, AppError> {
        if name.is_none() && role.is_none() {
            return self.find_user(id).await;
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
        let mut separated = builder.separated(", ");

        if let Some(name) = name {
            separated.push("name = ");
            separated.push_bind_unseparated(name);
        }

        if let Some(role) = role {
            separated.push("role = ");
            separated.push_bind_unseparated(role.as_str());
        }

        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(" RETURNING *");

        let user = builder
            .build_query_as::<User>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn set_pro(
        &self,
        id: i64,
        is_pro: bool,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET is_pro = $1, pro_expires_at = $2 WHERE id = $3 RETURNING *",
        )
        .bind(is_pro)
        .bind(expires_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn expire_pro_grants(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET is_pro = FALSE
            WHERE is_pro AND pro_expires_at IS NOT NULL AND pro_expires_at < $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_user(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_questions(&self, category: Option<&str>) -> Result<Vec<Question>, AppError> {
        let questions = sqlx::query_as::<_, Question>(
            "SELECT * FROM questions WHERE ($1::TEXT IS NULL OR category = $1) ORDER BY id",
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch questions: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;
        Ok(questions)
    }

    async fn find_question(&self, id: i64) -> Result<Option<Question>, AppError> {
        let question = sqlx::query_as::<_, Question>("SELECT * FROM questions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(question)
    }

    async fn create_question(&self, new: NewQuestion) -> Result<Question, AppError> {
        let question = sqlx::query_as::<_, Question>(
            r#"
            INSERT INTO questions (category, text, options, correct_answer, evaluation_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(new.category)
        .bind(new.text)
        .bind(Json(new.options))
        .bind(new.correct_answer)
        .bind(new.evaluation_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(question)
    }

    async fn update_question(
        &self,
        id: i64,
        patch: QuestionPatch,
    ) -> Result<Option<Question>, AppError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE questions SET ");
        let mut separated = builder.separated(", ");
        let mut touched = false;

        if let Some(category) = patch.category {
            separated.push("category = ");
            separated.push_bind_unseparated(category);
            touched = true;
        }

        if let Some(text) = patch.text {
            separated.push("text = ");
            separated.push_bind_unseparated(text);
            touched = true;
        }

        if let Some(options) = patch.options {
            separated.push("options = ");
            separated.push_bind_unseparated(Json(options));
            touched = true;
        }

        if let Some(correct_answer) = patch.correct_answer {
            separated.push("correct_answer = ");
            separated.push_bind_unseparated(correct_answer);
            touched = true;
        }

        if let Some(evaluation_id) = patch.evaluation_id {
            separated.push("evaluation_id = ");
            separated.push_bind_unseparated(evaluation_id);
            touched = true;
        }

        if !touched {
            return self.find_question(id).await;
        }

        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(" RETURNING *");

        let question = builder
            .build_query_as::<Question>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to update question: {:?}", e);
                AppError::InternalServerError(e.to_string())
            })?;
        Ok(question)
    }

    async fn delete_question(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_evaluations(&self) -> Result<Vec<Evaluation>, AppError> {
        let evaluations =
            sqlx::query_as::<_, Evaluation>("SELECT * FROM evaluations ORDER BY id DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(evaluations)
    }

    async fn find_evaluation(&self, id: i64) -> Result<Option<Evaluation>, AppError> {
        let evaluation = sqlx::query_as::<_, Evaluation>("SELECT * FROM evaluations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(evaluation)
    }

    async fn create_evaluation(
        &self,
        new: CreateEvaluationRequest,
    ) -> Result<Evaluation, AppError> {
        let evaluation = sqlx::query_as::<_, Evaluation>(
            r#"
            INSERT INTO evaluations (name, duration_minutes, question_count, is_active, company_tag)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(new.name)
        .bind(new.duration_minutes)
        .bind(new.question_count)
        .bind(new.is_active)
        .bind(new.company_tag)
        .fetch_one(&self.pool)
        .await?;
        Ok(evaluation)
    }

    async fn update_evaluation(
        &self,
        id: i64,
        patch: UpdateEvaluationRequest,
    ) -> Result<Option<Evaluation>, AppError> {
        if patch.is_empty() {
            return self.find_evaluation(id).await;
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE evaluations SET ");
        let mut separated = builder.separated(", ");

        if let Some(name) = patch.name {
            separated.push("name = ");
            separated.push_bind_unseparated(name);
        }

        if let Some(duration_minutes) = patch.duration_minutes {
            separated.push("duration_minutes = ");
            separated.push_bind_unseparated(duration_minutes);
        }

        if let Some(question_count) = patch.question_count {
            separated.push("question_count = ");
            separated.push_bind_unseparated(question_count);
        }

        if let Some(is_active) = patch.is_active {
            separated.push("is_active = ");
            separated.push_bind_unseparated(is_active);
        }

        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(" RETURNING *");

        let evaluation = builder
            .build_query_as::<Evaluation>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(evaluation)
    }

    async fn delete_evaluation(&self, id: i64) -> Result<bool, AppError> {
        // questions go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM evaluations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_session(&self, new: NewExamSession) -> Result<ExamSession, AppError> {
        let session = sqlx::query_as::<_, ExamSession>(
            r#"
            INSERT INTO exam_sessions (user_id, category, questions, answers, started_at, expires_at)
            VALUES ($1, $2, $3, '{}'::JSONB, $4, $5)
            RETURNING *
            "#,
        )
        .bind(new.user_id)
        .bind(new.category)
        .bind(Json(new.questions))
        .bind(new.started_at)
        .bind(new.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create exam session: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;
        Ok(session)
    }

    async fn find_session(&self, id: i64) -> Result<Option<ExamSession>, AppError> {
        let session = sqlx::query_as::<_, ExamSession>("SELECT * FROM exam_sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    async fn sessions_since(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<ExamSession>, AppError> {
        let sessions = sqlx::query_as::<_, ExamSession>(
            "SELECT * FROM exam_sessions WHERE user_id = $1 AND started_at >= $2",
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    async fn save_answers(
        &self,
        id: i64,
        answers: &Answers,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE exam_sessions SET answers = answers || $1::JSONB
            WHERE id = $2 AND finished_at IS NULL AND expires_at > $3
            "#,
        )
        .bind(Json(answers))
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn finish_session(
        &self,
        id: i64,
        now: DateTime<Utc>,
        grade: Grader,
    ) -> Result<ExamResult, AppError> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent submits and late answer writes.
        let session = sqlx::query_as::<_, ExamSession>(
            "SELECT * FROM exam_sessions WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Exam session not found".to_string()))?;

        if session.finished_at.is_some() {
            let result_id = session
                .result_id
                .ok_or(AppError::NotFound("Exam result no longer exists".to_string()))?;
            let result =
                sqlx::query_as::<_, ExamResult>("SELECT * FROM exam_results WHERE id = $1")
                    .bind(result_id)
                    .fetch_one(&mut *tx)
                    .await?;
            tx.commit().await?;
            return Ok(result);
        }

        let new: NewExamResult = grade(&session);
        let result = sqlx::query_as::<_, ExamResult>(
            r#"
            INSERT INTO exam_results
            (user_id, category, score, total_questions, failed_questions, question_ids, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(new.user_id)
        .bind(new.category)
        .bind(new.score)
        .bind(new.total_questions)
        .bind(Json(new.failed_questions))
        .bind(Json(new.question_ids))
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert exam result: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

        sqlx::query("UPDATE exam_sessions SET finished_at = $1, result_id = $2 WHERE id = $3")
            .bind(now)
            .bind(result.id)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result)
    }

    async fn recent_results(
        &self,
        user_id: i64,
        category: &str,
        limit: i64,
    ) -> Result<Vec<ExamResult>, AppError> {
        let results = sqlx::query_as::<_, ExamResult>(
            r#"
            SELECT * FROM exam_results
            WHERE user_id = $1 AND category = $2
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(category)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(results)
    }

    async fn results_since(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<ExamResult>, AppError> {
        let results = sqlx::query_as::<_, ExamResult>(
            "SELECT * FROM exam_results WHERE user_id = $1 AND created_at >= $2",
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(results)
    }

    async fn list_results(
        &self,
        user_id: Option<i64>,
        category: Option<&str>,
    ) -> Result<Vec<ExamResult>, AppError> {
        let results = sqlx::query_as::<_, ExamResult>(
            r#"
            SELECT * FROM exam_results
            WHERE ($1::BIGINT IS NULL OR user_id = $1)
              AND ($2::TEXT IS NULL OR category = $2)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        Ok(results)
    }

    async fn find_result(&self, id: i64) -> Result<Option<ExamResult>, AppError> {
        let result = sqlx::query_as::<_, ExamResult>("SELECT * FROM exam_results WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(result)
    }

    async fn find_session_by_result(
        &self,
        result_id: i64,
    ) -> Result<Option<ExamSession>, AppError> {
        let session =
            sqlx::query_as::<_, ExamSession>("SELECT * FROM exam_sessions WHERE result_id = $1")
                .bind(result_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(session)
    }

    async fn upsert_payment(&self, payment: NewPayment) -> Result<Payment, AppError> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments
            (transaction_id, reference, status, amount_in_cents, currency, payment_method, user_id, raw)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (transaction_id) DO UPDATE SET
                reference = EXCLUDED.reference,
                status = EXCLUDED.status,
                amount_in_cents = EXCLUDED.amount_in_cents,
                currency = EXCLUDED.currency,
                payment_method = EXCLUDED.payment_method,
                user_id = COALESCE(EXCLUDED.user_id, payments.user_id),
                raw = EXCLUDED.raw,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(payment.transaction_id)
        .bind(payment.reference)
        .bind(payment.status)
        .bind(payment.amount_in_cents)
        .bind(payment.currency)
        .bind(payment.payment_method)
        .bind(payment.user_id)
        .bind(Json(payment.raw))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to upsert payment: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;
        Ok(payment)
    }

    async fn find_payment(&self, transaction_id: &str) -> Result<Option<Payment>, AppError> {
        let payment =
            sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE transaction_id = $1")
                .bind(transaction_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(payment)
    }

    async fn list_payments(&self) -> Result<Vec<Payment>, AppError> {
        let payments =
            sqlx::query_as::<_, Payment>("SELECT * FROM payments ORDER BY created_at DESC, id DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(payments)
    }

    async fn get_setting(&self, key: &str) -> Result<Option<i64>, AppError> {
        let value = sqlx::query_scalar::<_, i64>("SELECT value FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn put_setting(&self, key: &str, value: i64) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
