// src/exam/scoring.rs

use crate::models::{
    exam_result::{FailedQuestion, NewExamResult, ReviewItem},
    exam_session::{Answers, ExamSession},
    question::QuestionSnapshot,
};

/// Answer recorded for a question that was never answered.
pub const UNANSWERED: i32 = -1;

/// Counts correct answers and lists every question that was not.
pub fn score_answers(questions: &[QuestionSnapshot], answers: &Answers) -> (i32, Vec<FailedQuestion>) {
    let mut score = 0;
    let mut failed = Vec::new();

    for q in questions {
        let user_answer = answers.get(&q.id).copied().unwrap_or(UNANSWERED);
        if user_answer >= 0 && user_answer as usize == q.correct_answer {
            score += 1;
        } else {
            failed.push(FailedQuestion {
                question_id: q.id,
                user_answer,
            });
        }
    }

    (score, failed)
}

/// Result row for a session, graded against its own snapshot.
pub fn grade(session: &ExamSession) -> NewExamResult {
    let (score, failed_questions) = score_answers(&session.questions, &session.answers);
    NewExamResult {
        user_id: session.user_id,
        category: session.category.clone(),
        score,
        total_questions: session.questions.len() as i32,
        failed_questions,
        question_ids: session.questions.iter().map(|q| q.id).collect(),
    }
}

/// Per-question breakdown shown after an exam.
pub fn review(session: &ExamSession) -> Vec<ReviewItem> {
    session
        .questions
        .iter()
        .map(|q| {
            let user_answer = session.answers.get(&q.id).copied().unwrap_or(UNANSWERED);
            ReviewItem {
                question_id: q.id,
                text: q.text.clone(),
                options: q.options.clone(),
                correct_answer: q.correct_answer,
                user_answer,
                is_correct: user_answer >= 0 && user_answer as usize == q.correct_answer,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::types::Json;

    fn snap(id: i64, correct: usize) -> QuestionSnapshot {
        QuestionSnapshot {
            id,
            text: format!("Q{}", id),
            options: vec!["a".into(), "b".into(), "c".into()],
            correct_answer: correct,
        }
    }

    fn session(questions: Vec<QuestionSnapshot>, answers: Answers) -> ExamSession {
        let now = Utc::now();
        ExamSession {
            id: 1,
            user_id: 5,
            category: "B1".into(),
            questions: Json(questions),
            answers: Json(answers),
            started_at: now,
            expires_at: now,
            finished_at: None,
            result_id: None,
        }
    }

    #[test]
    fn perfect_score() {
        let questions = vec![snap(1, 0), snap(2, 2)];
        let answers = Answers::from([(1, 0), (2, 2)]);
        let (score, failed) = score_answers(&questions, &answers);
        assert_eq!(score, 2);
        assert!(failed.is_empty());
    }

    #[test]
    fn wrong_and_missing_answers_fail() {
        let questions = vec![snap(1, 0), snap(2, 1), snap(3, 2)];
        let answers = Answers::from([(1, 0), (2, 2)]);
        let (score, failed) = score_answers(&questions, &answers);

        assert_eq!(score, 1);
        assert_eq!(
            failed,
            vec![
                FailedQuestion {
                    question_id: 2,
                    user_answer: 2
                },
                FailedQuestion {
                    question_id: 3,
                    user_answer: UNANSWERED
                },
            ]
        );
    }

    #[test]
    fn answers_to_foreign_questions_are_ignored() {
        let questions = vec![snap(1, 1)];
        let answers = Answers::from([(99, 1)]);
        let (score, failed) = score_answers(&questions, &answers);
        assert_eq!(score, 0);
        assert_eq!(failed.len(), 1);
    }

    #[test]
    fn grade_keeps_score_plus_failures_equal_to_total() {
        let s = session(
            vec![snap(1, 0), snap(2, 1), snap(3, 2), snap(4, 0)],
            Answers::from([(1, 0), (3, 2), (4, 2)]),
        );
        let result = grade(&s);

        assert_eq!(result.total_questions, 4);
        assert_eq!(result.score, 2);
        assert_eq!(
            result.score,
            result.total_questions - result.failed_questions.len() as i32
        );
        assert_eq!(result.question_ids, vec![1, 2, 3, 4]);
        assert_eq!(result.category, "B1");
    }

    #[test]
    fn review_marks_each_question() {
        let s = session(vec![snap(1, 0), snap(2, 1)], Answers::from([(1, 0)]));
        let items = review(&s);
        assert!(items[0].is_correct);
        assert!(!items[1].is_correct);
        assert_eq!(items[1].user_answer, UNANSWERED);
    }
}
