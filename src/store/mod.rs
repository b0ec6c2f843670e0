// src/store/mod.rs

//! Persistence boundary.
//!
//! Handlers and the exam/billing engines only talk to `dyn Store`. Business
//! rules stay above this trait; implementations only load and save rows.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

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

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type DynStore = Arc<dyn Store>;

/// Builds the result row for a session, given the session as locked by
/// `finish_session`.
pub type Grader = fn(&ExamSession) -> NewExamResult;

/// Partial update of a question. `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct QuestionPatch {
    pub category: Option<String>,
    pub text: Option<String>,
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<i32>,
    /// `Some(None)` clears the link.
    pub evaluation_id: Option<Option<i64>>,
}

#[async_trait]
pub trait Store: Send + Sync {
    // users
    /// Fails with `Conflict` when the email is taken.
    async fn create_user(&self, new: NewUser) -> Result<User, AppError>;
    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    /// Newest first.
    async fn list_users(&self) -> Result<Vec<User>, AppError>;
    async fn update_user(
        &self,
        id: i64,
        name: Option<String>,
        role: Option<Role>,
    ) -> Result<Option<User>, AppError>;
    async fn set_pro(
        &self,
        id: i64,
        is_pro: bool,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Option<User>, AppError>;
    /// Clears `is_pro` on every grant whose expiry is before `now`.
    /// Returns how many users changed.
    async fn expire_pro_grants(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
    async fn delete_user(&self, id: i64) -> Result<bool, AppError>;

    // questions
    async fn list_questions(&self, category: Option<&str>) -> Result<Vec<Question>, AppError>;
    async fn find_question(&self, id: i64) -> Result<Option<Question>, AppError>;
    async fn create_question(&self, new: NewQuestion) -> Result<Question, AppError>;
    async fn update_question(
        &self,
        id: i64,
        patch: QuestionPatch,
    ) -> Result<Option<Question>, AppError>;
    async fn delete_question(&self, id: i64) -> Result<bool, AppError>;

    // evaluations
    async fn list_evaluations(&self) -> Result<Vec<Evaluation>, AppError>;
    async fn find_evaluation(&self, id: i64) -> Result<Option<Evaluation>, AppError>;
    async fn create_evaluation(
        &self,
        new: CreateEvaluationRequest,
    ) -> Result<Evaluation, AppError>;
    async fn update_evaluation(
        &self,
        id: i64,
        patch: UpdateEvaluationRequest,
    ) -> Result<Option<Evaluation>, AppError>;
    /// Also deletes the evaluation's questions.
    async fn delete_evaluation(&self, id: i64) -> Result<bool, AppError>;

    // exam sessions
    async fn create_session(&self, new: NewExamSession) -> Result<ExamSession, AppError>;
    async fn find_session(&self, id: i64) -> Result<Option<ExamSession>, AppError>;
    /// Sessions the user started at or after `since`, finished or not.
    async fn sessions_since(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<ExamSession>, AppError>;
    /// Merges `answers` into an unfinished, unexpired session.
    /// Returns false when the session is finished, expired or missing.
    async fn save_answers(
        &self,
        id: i64,
        answers: &Answers,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError>;
    /// Moves a session to `Finished` exactly once. The grader runs against the
    /// session as it is at that moment; a session already finished yields its
    /// stored result without calling the grader.
    async fn finish_session(
        &self,
        id: i64,
        now: DateTime<Utc>,
        grade: Grader,
    ) -> Result<ExamResult, AppError>;

    // results
    /// Most recent first.
    async fn recent_results(
        &self,
        user_id: i64,
        category: &str,
        limit: i64,
    ) -> Result<Vec<ExamResult>, AppError>;
    async fn results_since(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<ExamResult>, AppError>;
    async fn list_results(
        &self,
        user_id: Option<i64>,
        category: Option<&str>,
    ) -> Result<Vec<ExamResult>, AppError>;
    async fn find_result(&self, id: i64) -> Result<Option<ExamResult>, AppError>;
    async fn find_session_by_result(&self, result_id: i64)
    -> Result<Option<ExamSession>, AppError>;

    // payments
    /// Insert or overwrite by `transaction_id`.
    async fn upsert_payment(&self, payment: NewPayment) -> Result<Payment, AppError>;
    async fn find_payment(&self, transaction_id: &str) -> Result<Option<Payment>, AppError>;
    async fn list_payments(&self) -> Result<Vec<Payment>, AppError>;

    // settings
    async fn get_setting(&self, key: &str) -> Result<Option<i64>, AppError>;
    async fn put_setting(&self, key: &str, value: i64) -> Result<(), AppError>;
}
