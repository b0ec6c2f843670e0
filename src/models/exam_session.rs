// src/models/exam_session.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

use crate::models::question::{PublicQuestion, QuestionSnapshot};

/// Question id -> selected option index.
pub type Answers = BTreeMap<i64, i32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Finished,
}

/// Represents the 'exam_sessions' table: one running or finished exam.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExamSession {
    pub id: i64,
    pub user_id: i64,
    pub category: String,

    /// Snapshot presented to the user, including the remapped answer key.
    pub questions: Json<Vec<QuestionSnapshot>>,

    pub answers: Json<Answers>,

    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub result_id: Option<i64>,
}

impl ExamSession {
    pub fn status(&self) -> SessionStatus {
        if self.finished_at.is_some() {
            SessionStatus::Finished
        } else {
            SessionStatus::InProgress
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        if self.finished_at.is_some() {
            return 0;
        }
        (self.expires_at - now).num_seconds().max(0)
    }
}

/// Fields for inserting a session.
#[derive(Debug, Clone)]
pub struct NewExamSession {
    pub user_id: i64,
    pub category: String,
    pub questions: Vec<QuestionSnapshot>,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// DTO for starting an exam.
#[derive(Debug, Deserialize, Validate)]
pub struct StartExamRequest {
    #[validate(length(min = 1, max = 20))]
    pub category: String,
}

/// DTO for recording one answer.
#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub question_id: i64,
    pub answer: i32,
}

/// DTO for finishing an exam. Answers sent here are merged before scoring.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitExamRequest {
    #[serde(default)]
    pub answers: Answers,
}

/// DTO describing a session to its owner. The answer key is never included.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: i64,
    pub category: String,
    pub status: SessionStatus,
    pub questions: Vec<PublicQuestion>,
    pub answers: Answers,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub remaining_seconds: i64,
    pub result_id: Option<i64>,
}

impl SessionResponse {
    pub fn from_session(session: &ExamSession, now: DateTime<Utc>) -> Self {
        Self {
            id: session.id,
            category: session.category.clone(),
            status: session.status(),
            questions: session.questions.iter().map(|q| q.to_public()).collect(),
            answers: session.answers.0.clone(),
            started_at: session.started_at,
            expires_at: session.expires_at,
            remaining_seconds: session.remaining_seconds(now),
            result_id: session.result_id,
        }
    }
}
