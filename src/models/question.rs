// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::error::AppError;

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// A standard code ("A2", "B1", "C1") or a custom evaluation id.
    pub category: String,

    pub text: String,

    /// Ordered answer options. Stored as a JSON array in the database.
    pub options: Json<Vec<String>>,

    /// Zero-based index into `options`.
    pub correct_answer: i32,

    pub evaluation_id: Option<i64>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Question {
    pub fn has_valid_answer(&self) -> bool {
        self.options.len() >= 2
            && self.correct_answer >= 0
            && (self.correct_answer as usize) < self.options.len()
    }
}

/// The per-session copy of a question, with the option order actually shown.
/// Never written back to the question bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSnapshot {
    pub id: i64,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
}

impl QuestionSnapshot {
    pub fn to_public(&self) -> PublicQuestion {
        PublicQuestion {
            id: self.id,
            text: self.text.clone(),
            options: self.options.clone(),
        }
    }
}

/// DTO for sending a question to a running exam (excludes the answer key).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub text: String,
    pub options: Vec<String>,
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 20))]
    pub category: String,
    #[validate(length(min = 1, max = 2000))]
    pub text: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    pub correct_answer: i32,
}

/// DTO for updating a question. Fields are optional.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 20))]
    pub category: Option<String>,
    #[validate(length(min = 1, max = 2000))]
    pub text: Option<String>,
    #[validate(custom(function = validate_options))]
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<i32>,
}

impl UpdateQuestionRequest {
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.text.is_none()
            && self.options.is_none()
            && self.correct_answer.is_none()
    }
}

/// Fields of a question after validation and sanitizing.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub category: String,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: i32,
    pub evaluation_id: Option<i64>,
}

/// Query parameters for the admin question list.
#[derive(Debug, Deserialize)]
pub struct QuestionListParams {
    pub category: Option<String>,
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() < 2 {
        return Err(validator::ValidationError::new("at_least_two_options"));
    }
    for opt in options {
        if opt.trim().is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_empty"));
        }
        if opt.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

/// `0 <= correct_answer < options.len()`.
pub fn check_answer_index(options: &[String], correct_answer: i32) -> Result<(), AppError> {
    if correct_answer < 0 || correct_answer as usize >= options.len() {
        return Err(AppError::BadRequest(format!(
            "correct_answer {} is out of range for {} options",
            correct_answer,
            options.len()
        )));
    }
    Ok(())
}
