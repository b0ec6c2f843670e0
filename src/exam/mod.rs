// src/exam/mod.rs

//! Exam sessions: `InProgress -> Finished`, nothing after that.
//!
//! The deadline is fixed when the session starts. Any access after it
//! finishes the session with whatever answers were recorded.

pub mod scoring;
pub mod selection;

use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveTime, Utc};

use crate::{
    config::{
        Config, PRO_DURATION_SECS, PRO_QUESTION_COUNT, RECENT_RESULTS_WINDOW,
        TRIAL_DURATION_SECS, TRIAL_QUESTION_COUNT,
    },
    error::AppError,
    models::{
        category::Category,
        evaluation::Evaluation,
        exam_result::ExamResult,
        exam_session::{Answers, ExamSession, NewExamSession, SessionStatus},
        user::User,
    },
    store::Store,
};

/// Size and time budget of one exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExamPlan {
    pub question_count: usize,
    pub duration_secs: i64,
    /// Standard categories shuffle options; custom evaluations keep their order.
    pub shuffle_options: bool,
}

impl ExamPlan {
    pub fn standard(is_pro: bool) -> Self {
        if is_pro {
            Self {
                question_count: PRO_QUESTION_COUNT,
                duration_secs: PRO_DURATION_SECS,
                shuffle_options: true,
            }
        } else {
            Self {
                question_count: TRIAL_QUESTION_COUNT,
                duration_secs: TRIAL_DURATION_SECS,
                shuffle_options: true,
            }
        }
    }

    pub fn for_evaluation(evaluation: &Evaluation) -> Self {
        Self {
            question_count: evaluation.question_count.max(1) as usize,
            duration_secs: i64::from(evaluation.duration_minutes.max(1)) * 60,
            shuffle_options: false,
        }
    }
}

/// Start of the calendar day containing `now`, in a zone `offset_hours` from UTC.
pub fn local_day_start(now: DateTime<Utc>, offset_hours: i32) -> DateTime<Utc> {
    let offset = Duration::hours(i64::from(offset_hours));
    let local_midnight = (now.naive_utc() + offset).date().and_time(NaiveTime::MIN);
    (local_midnight - offset).and_utc()
}

/// Whether any of today's exam categories is a standard one.
pub fn daily_limit_reached<'a>(categories_today: impl IntoIterator<Item = &'a str>) -> bool {
    categories_today
        .into_iter()
        .any(Category::is_standard_key)
}

/// Selects questions and opens a session for `user`.
///
/// Users without an active Pro grant get one standard exam per local day.
/// Custom evaluations are not capped.
pub async fn start_exam(
    store: &dyn Store,
    config: &Config,
    user: &User,
    category: Category,
    now: DateTime<Utc>,
) -> Result<ExamSession, AppError> {
    let is_pro = user.has_active_pro(now);

    let plan = match category {
        Category::Standard(_) => {
            if !is_pro {
                let since = local_day_start(now, config.local_utc_offset_hours);
                // Open sessions count too, so an unsubmitted exam still uses the day.
                let sessions = store.sessions_since(user.id, since).await?;
                let results = store.results_since(user.id, since).await?;
                let categories = sessions
                    .iter()
                    .map(|s| s.category.as_str())
                    .chain(results.iter().map(|r| r.category.as_str()));
                if daily_limit_reached(categories) {
                    tracing::info!(user_id = user.id, "Daily exam limit reached");
                    return Err(AppError::DailyLimitReached);
                }
            }
            ExamPlan::standard(is_pro)
        }
        Category::Evaluation(id) => {
            let evaluation = store
                .find_evaluation(id)
                .await?
                .filter(|e| e.is_active)
                .ok_or(AppError::NotFound("Evaluation not found".to_string()))?;
            if !evaluation.accessible_by(user.role()) {
                return Err(AppError::Forbidden(
                    "Evaluation belongs to another company".to_string(),
                ));
            }
            ExamPlan::for_evaluation(&evaluation)
        }
    };

    let key = category.to_string();
    let pool = store.list_questions(Some(&key)).await?;
    if pool.is_empty() {
        return Err(AppError::NotFound(format!(
            "No questions available for category {}",
            key
        )));
    }

    // Personalization is best effort; a failure here must not block the exam.
    let avoid = match store
        .recent_results(user.id, &key, RECENT_RESULTS_WINDOW)
        .await
    {
        Ok(recent) => selection::avoid_set(&recent),
        Err(e) => {
            tracing::warn!("Could not load recent results for user {}: {}", user.id, e);
            HashSet::new()
        }
    };

    let questions = {
        let mut rng = rand::thread_rng();
        selection::select_questions(
            pool,
            &avoid,
            plan.question_count,
            plan.shuffle_options,
            &mut rng,
        )
    };

    let session = store
        .create_session(NewExamSession {
            user_id: user.id,
            category: key,
            questions,
            started_at: now,
            expires_at: now + Duration::seconds(plan.duration_secs),
        })
        .await?;

    tracing::info!(
        session_id = session.id,
        user_id = user.id,
        category = %session.category,
        questions = session.questions.len(),
        "Exam started"
    );
    Ok(session)
}

/// Loads a session belonging to `user_id`, finishing it first if its time ran out.
pub async fn load_session(
    store: &dyn Store,
    user_id: i64,
    session_id: i64,
    now: DateTime<Utc>,
) -> Result<ExamSession, AppError> {
    let session = store
        .find_session(session_id)
        .await?
        .filter(|s| s.user_id == user_id)
        .ok_or(AppError::NotFound("Exam session not found".to_string()))?;

    if session.status() == SessionStatus::InProgress && session.is_expired(now) {
        let result = store.finish_session(session.id, now, scoring::grade).await?;
        tracing::info!(
            session_id = session.id,
            result_id = result.id,
            "Exam finished on timeout"
        );
        return store
            .find_session(session_id)
            .await?
            .ok_or(AppError::NotFound("Exam session not found".to_string()));
    }

    Ok(session)
}

/// Rejects answers that do not fit the session's snapshot.
pub fn check_answers(session: &ExamSession, answers: &Answers) -> Result<(), AppError> {
    for (question_id, answer) in answers {
        let question = session
            .questions
            .iter()
            .find(|q| q.id == *question_id)
            .ok_or_else(|| {
                AppError::BadRequest(format!("Question {} is not part of this exam", question_id))
            })?;
        if *answer < 0 || *answer as usize >= question.options.len() {
            return Err(AppError::BadRequest(format!(
                "Answer {} is out of range for question {}",
                answer, question_id
            )));
        }
    }
    Ok(())
}

/// Records or overwrites answers on a running session.
pub async fn record_answers(
    store: &dyn Store,
    session: &ExamSession,
    answers: &Answers,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if session.status() == SessionStatus::Finished {
        return Err(AppError::BadRequest("Exam already finished".to_string()));
    }
    check_answers(session, answers)?;
    if !store.save_answers(session.id, answers, now).await? {
        return Err(AppError::BadRequest("Exam already finished".to_string()));
    }
    Ok(())
}

/// Finishes the session, merging `final_answers` first while time remains.
/// Submitting a finished session returns its stored result.
pub async fn submit_exam(
    store: &dyn Store,
    session: &ExamSession,
    final_answers: &Answers,
    now: DateTime<Utc>,
) -> Result<ExamResult, AppError> {
    if session.status() == SessionStatus::InProgress && !final_answers.is_empty() {
        if session.is_expired(now) {
            tracing::debug!(session_id = session.id, "Ignoring answers sent after expiry");
        } else {
            check_answers(session, final_answers)?;
            if !store.save_answers(session.id, final_answers, now).await? {
                tracing::debug!(session_id = session.id, "Final answers arrived after expiry");
            }
        }
    }

    let result = store.finish_session(session.id, now, scoring::grade).await?;
    tracing::info!(
        session_id = session.id,
        result_id = result.id,
        score = result.score,
        total = result.total_questions,
        "Exam submitted"
    );
    Ok(result)
}
