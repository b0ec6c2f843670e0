// src/store/memory.rs

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;

use super::{Grader, QuestionPatch, Store};
use crate::{
    error::AppError,
    models::{
        evaluation::{CreateEvaluationRequest, Evaluation, UpdateEvaluationRequest},
        exam_result::ExamResult,
        exam_session::{Answers, ExamSession, NewExamSession},
        payment::{NewPayment, Payment},
        question::{NewQuestion, Question},
        user::{NewUser, Role, User},
    },
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    questions: BTreeMap<i64, Question>,
    evaluations: BTreeMap<i64, Evaluation>,
    sessions: BTreeMap<i64, ExamSession>,
    results: BTreeMap<i64, ExamResult>,
    payments: BTreeMap<String, Payment>,
    settings: BTreeMap<String, i64>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process `Store` with the same observable behavior as `PgStore`.
/// Nothing survives a restart; used by the integration tests and demos.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.tables
            .lock()
            .map_err(|_| AppError::InternalServerError("memory store poisoned".to_string()))
    }
}

fn newest_first(results: &mut [ExamResult]) {
    results.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, new: NewUser) -> Result<User, AppError> {
        let mut t = self.lock()?;
        if t.users.values().any(|u| u.email == new.email) {
            return Err(AppError::Conflict(format!(
                "Email '{}' is already registered",
                new.email
            )));
        }
        let id = t.next_id();
        let user = User {
            id,
            email: new.email,
            name: new.name,
            password: new.password_hash,
            role: new.role.as_str().to_string(),
            is_pro: false,
            pro_expires_at: None,
            created_at: Utc::now(),
        };
        t.users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        Ok(self.lock()?.users.values().rev().cloned().collect())
    }

    async fn update_user(
        &self,
        id: i64,
        name: Option<String>,
        role: Option<Role>,
    ) -> Result<Option<User>, AppError> {
        let mut t = self.lock()?;
        let Some(user) = t.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = name {
            user.name = name;
        }
        if let Some(role) = role {
            user.role = role.as_str().to_string();
        }
        Ok(Some(user.clone()))
    }

    async fn set_pro(
        &self,
        id: i64,
        is_pro: bool,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Option<User>, AppError> {
        let mut t = self.lock()?;
        let Some(user) = t.users.get_mut(&id) else {
            return Ok(None);
        };
        user.is_pro = is_pro;
        user.pro_expires_at = expires_at;
        Ok(Some(user.clone()))
    }

    async fn expire_pro_grants(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut t = self.lock()?;
        let mut changed = 0;
        for user in t.users.values_mut() {
            if user.is_pro && user.pro_expires_at.is_some_and(|exp| exp < now) {
                user.is_pro = false;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn delete_user(&self, id: i64) -> Result<bool, AppError> {
        let mut t = self.lock()?;
        if t.users.remove(&id).is_none() {
            return Ok(false);
        }
        t.sessions.retain(|_, s| s.user_id != id);
        t.results.retain(|_, r| r.user_id != id);
        for payment in t.payments.values_mut() {
            if payment.user_id == Some(id) {
                payment.user_id = None;
            }
        }
        Ok(true)
    }

    async fn list_questions(&self, category: Option<&str>) -> Result<Vec<Question>, AppError> {
        Ok(self
            .lock()?
            .questions
            .values()
            .filter(|q| category.is_none_or(|c| q.category == c))
            .cloned()
            .collect())
    }

    async fn find_question(&self, id: i64) -> Result<Option<Question>, AppError> {
        Ok(self.lock()?.questions.get(&id).cloned())
    }

    async fn create_question(&self, new: NewQuestion) -> Result<Question, AppError> {
        let mut t = self.lock()?;
        let id = t.next_id();
        let question = Question {
            id,
            category: new.category,
            text: new.text,
            options: Json(new.options),
            correct_answer: new.correct_answer,
            evaluation_id: new.evaluation_id,
            created_at: Some(Utc::now()),
        };
        t.questions.insert(id, question.clone());
        Ok(question)
    }

    async fn update_question(
        &self,
        id: i64,
        patch: QuestionPatch,
    ) -> Result<Option<Question>, AppError> {
        let mut t = self.lock()?;
        let Some(q) = t.questions.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(category) = patch.category {
            q.category = category;
        }
        if let Some(text) = patch.text {
            q.text = text;
        }
        if let Some(options) = patch.options {
            q.options = Json(options);
        }
        if let Some(correct_answer) = patch.correct_answer {
            q.correct_answer = correct_answer;
        }
        if let Some(evaluation_id) = patch.evaluation_id {
            q.evaluation_id = evaluation_id;
        }
        Ok(Some(q.clone()))
    }

    async fn delete_question(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.lock()?.questions.remove(&id).is_some())
    }

    async fn list_evaluations(&self) -> Result<Vec<Evaluation>, AppError> {
        Ok(self.lock()?.evaluations.values().rev().cloned().collect())
    }

    async fn find_evaluation(&self, id: i64) -> Result<Option<Evaluation>, AppError> {
        Ok(self.lock()?.evaluations.get(&id).cloned())
    }

    async fn create_evaluation(
        &self,
        new: CreateEvaluationRequest,
    ) -> Result<Evaluation, AppError> {
        let mut t = self.lock()?;
        let id = t.next_id();
        let evaluation = Evaluation {
            id,
            name: new.name,
            duration_minutes: new.duration_minutes,
            question_count: new.question_count,
            is_active: new.is_active,
            company_tag: new.company_tag,
            created_at: Some(Utc::now()),
        };
        t.evaluations.insert(id, evaluation.clone());
        Ok(evaluation)
    }

    async fn update_evaluation(
        &self,
        id: i64,
        patch: UpdateEvaluationRequest,
    ) -> Result<Option<Evaluation>, AppError> {
        let mut t = self.lock()?;
        let Some(e) = t.evaluations.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            e.name = name;
        }
        if let Some(duration_minutes) = patch.duration_minutes {
            e.duration_minutes = duration_minutes;
        }
        if let Some(question_count) = patch.question_count {
            e.question_count = question_count;
        }
        if let Some(is_active) = patch.is_active {
            e.is_active = is_active;
        }
        Ok(Some(e.clone()))
    }

    async fn delete_evaluation(&self, id: i64) -> Result<bool, AppError> {
        let mut t = self.lock()?;
        if t.evaluations.remove(&id).is_none() {
            return Ok(false);
        }
        t.questions.retain(|_, q| q.evaluation_id != Some(id));
        Ok(true)
    }

    async fn create_session(&self, new: NewExamSession) -> Result<ExamSession, AppError> {
        let mut t = self.lock()?;
        let id = t.next_id();
        let session = ExamSession {
            id,
            user_id: new.user_id,
            category: new.category,
            questions: Json(new.questions),
            answers: Json(Answers::new()),
            started_at: new.started_at,
            expires_at: new.expires_at,
            finished_at: None,
            result_id: None,
        };
        t.sessions.insert(id, session.clone());
        Ok(session)
    }

    async fn find_session(&self, id: i64) -> Result<Option<ExamSession>, AppError> {
        Ok(self.lock()?.sessions.get(&id).cloned())
    }

    async fn sessions_since(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<ExamSession>, AppError> {
        Ok(self
            .lock()?
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && s.started_at >= since)
            .cloned()
            .collect())
    }

    async fn save_answers(
        &self,
        id: i64,
        answers: &Answers,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut t = self.lock()?;
        match t.sessions.get_mut(&id) {
            Some(s) if s.finished_at.is_none() && s.expires_at > now => {
                s.answers.0.extend(answers.iter().map(|(k, v)| (*k, *v)));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn finish_session(
        &self,
        id: i64,
        now: DateTime<Utc>,
        grade: Grader,
    ) -> Result<ExamResult, AppError> {
        let mut t = self.lock()?;
        let session = t
            .sessions
            .get(&id)
            .cloned()
            .ok_or(AppError::NotFound("Exam session not found".to_string()))?;

        if session.finished_at.is_some() {
            return session
                .result_id
                .and_then(|rid| t.results.get(&rid).cloned())
                .ok_or(AppError::NotFound("Exam result no longer exists".to_string()));
        }

        let new = grade(&session);
        let result_id = t.next_id();
        let result = ExamResult {
            id: result_id,
            user_id: new.user_id,
            category: new.category,
            score: new.score,
            total_questions: new.total_questions,
            failed_questions: Json(new.failed_questions),
            question_ids: Some(Json(new.question_ids)),
            created_at: now,
        };
        t.results.insert(result_id, result.clone());
        if let Some(s) = t.sessions.get_mut(&id) {
            s.finished_at = Some(now);
            s.result_id = Some(result_id);
        }
        Ok(result)
    }

    async fn recent_results(
        &self,
        user_id: i64,
        category: &str,
        limit: i64,
    ) -> Result<Vec<ExamResult>, AppError> {
        let mut results: Vec<ExamResult> = self
            .lock()?
            .results
            .values()
            .filter(|r| r.user_id == user_id && r.category == category)
            .cloned()
            .collect();
        newest_first(&mut results);
        results.truncate(limit.max(0) as usize);
        Ok(results)
    }

    async fn results_since(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<ExamResult>, AppError> {
        Ok(self
            .lock()?
            .results
            .values()
            .filter(|r| r.user_id == user_id && r.created_at >= since)
            .cloned()
            .collect())
    }

    async fn list_results(
        &self,
        user_id: Option<i64>,
        category: Option<&str>,
    ) -> Result<Vec<ExamResult>, AppError> {
        let mut results: Vec<ExamResult> = self
            .lock()?
            .results
            .values()
            .filter(|r| user_id.is_none_or(|u| r.user_id == u))
            .filter(|r| category.is_none_or(|c| r.category == c))
            .cloned()
            .collect();
        newest_first(&mut results);
        Ok(results)
    }

    async fn find_result(&self, id: i64) -> Result<Option<ExamResult>, AppError> {
        Ok(self.lock()?.results.get(&id).cloned())
    }

    async fn find_session_by_result(
        &self,
        result_id: i64,
    ) -> Result<Option<ExamSession>, AppError> {
        Ok(self
            .lock()?
            .sessions
            .values()
            .find(|s| s.result_id == Some(result_id))
            .cloned())
    }

    async fn upsert_payment(&self, payment: NewPayment) -> Result<Payment, AppError> {
        let mut t = self.lock()?;
        let now = Utc::now();
        let existing = t.payments.get(&payment.transaction_id).cloned();
        let row = match existing {
            Some(prev) => Payment {
                reference: payment.reference,
                status: payment.status,
                amount_in_cents: payment.amount_in_cents,
                currency: payment.currency,
                payment_method: payment.payment_method,
                user_id: payment.user_id.or(prev.user_id),
                raw: Json(payment.raw),
                updated_at: now,
                ..prev
            },
            None => Payment {
                id: t.next_id(),
                transaction_id: payment.transaction_id.clone(),
                reference: payment.reference,
                status: payment.status,
                amount_in_cents: payment.amount_in_cents,
                currency: payment.currency,
                payment_method: payment.payment_method,
                user_id: payment.user_id,
                raw: Json(payment.raw),
                created_at: now,
                updated_at: now,
            },
        };
        t.payments.insert(row.transaction_id.clone(), row.clone());
        Ok(row)
    }

    async fn find_payment(&self, transaction_id: &str) -> Result<Option<Payment>, AppError> {
        Ok(self.lock()?.payments.get(transaction_id).cloned())
    }

    async fn list_payments(&self) -> Result<Vec<Payment>, AppError> {
        let mut payments: Vec<Payment> = self.lock()?.payments.values().cloned().collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(payments)
    }

    async fn get_setting(&self, key: &str) -> Result<Option<i64>, AppError> {
        Ok(self.lock()?.settings.get(key).copied())
    }

    async fn put_setting(&self, key: &str, value: i64) -> Result<(), AppError> {
        self.lock()?.settings.insert(key.to_string(), value);
        Ok(())
    }
}
