// src/models/exam_result.rs

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

/// A question answered wrong or left blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedQuestion {
    pub question_id: i64,
    /// `-1` when the question was never answered.
    pub user_answer: i32,
}

/// Represents the 'exam_results' table in the database.
/// One row per finished exam, never updated afterwards.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExamResult {
    pub id: i64,
    pub user_id: i64,
    pub category: String,
    pub score: i32,
    pub total_questions: i32,
    pub failed_questions: Json<Vec<FailedQuestion>>,

    /// The exact question set presented. Older rows may lack it.
    pub question_ids: Option<Json<Vec<i64>>>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl ExamResult {
    /// Ids this attempt exposed the user to.
    pub fn seen_question_ids(&self) -> Vec<i64> {
        match &self.question_ids {
            Some(ids) => ids.0.clone(),
            None => self.failed_questions.iter().map(|f| f.question_id).collect(),
        }
    }
}

/// Fields for inserting a result.
#[derive(Debug, Clone)]
pub struct NewExamResult {
    pub user_id: i64,
    pub category: String,
    pub score: i32,
    pub total_questions: i32,
    pub failed_questions: Vec<FailedQuestion>,
    pub question_ids: Vec<i64>,
}

/// One line of the post-exam review.
#[derive(Debug, Serialize)]
pub struct ReviewItem {
    pub question_id: i64,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    pub user_answer: i32,
    pub is_correct: bool,
}

/// DTO returned once an exam is finished.
#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub result: ExamResult,
    pub review: Vec<ReviewItem>,
}

/// Query parameters for listing results.
#[derive(Debug, Deserialize)]
pub struct ResultListParams {
    pub category: Option<String>,
    /// Admin listing only.
    pub user_id: Option<i64>,
}
