// src/exam/selection.rs

//! Picks the questions of a new exam and shuffles their options.

use std::collections::HashSet;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::models::{
    exam_result::ExamResult,
    question::{Question, QuestionSnapshot},
};

/// Union of the question ids exposed by previous attempts.
pub fn avoid_set(recent: &[ExamResult]) -> HashSet<i64> {
    recent
        .iter()
        .flat_map(|r| r.seen_question_ids())
        .collect()
}

/// Draws up to `count` distinct questions from `pool`.
///
/// Questions in `avoid` are skipped when enough others remain; otherwise the
/// whole pool is used. A pool smaller than `count` yields all of it.
pub fn select_questions<R: Rng + ?Sized>(
    pool: Vec<Question>,
    avoid: &HashSet<i64>,
    count: usize,
    shuffle_options: bool,
    rng: &mut R,
) -> Vec<QuestionSnapshot> {
    let mut seen = HashSet::new();
    let mut pool: Vec<Question> = pool
        .into_iter()
        .filter(|q| {
            if !q.has_valid_answer() {
                tracing::warn!(question_id = q.id, "Skipping question with invalid answer key");
                return false;
            }
            seen.insert(q.id)
        })
        .collect();

    let fresh: Vec<Question> = pool
        .iter()
        .filter(|q| !avoid.contains(&q.id))
        .cloned()
        .collect();
    if fresh.len() >= count {
        pool = fresh;
    }

    pool.shuffle(rng);
    pool.truncate(count);

    pool.iter()
        .map(|q| {
            if shuffle_options {
                shuffled_snapshot(q, rng)
            } else {
                snapshot(q)
            }
        })
        .collect()
}

/// Copy of the question in its stored option order.
pub fn snapshot(question: &Question) -> QuestionSnapshot {
    QuestionSnapshot {
        id: question.id,
        text: question.text.clone(),
        options: question.options.0.clone(),
        correct_answer: question.correct_answer as usize,
    }
}

/// Copy of the question with options permuted and the answer key following
/// the originally correct option.
pub fn shuffled_snapshot<R: Rng + ?Sized>(question: &Question, rng: &mut R) -> QuestionSnapshot {
    let mut order: Vec<usize> = (0..question.options.len()).collect();
    order.shuffle(rng);

    let original_correct = question.correct_answer as usize;
    let correct_answer = order
        .iter()
        .position(|&i| i == original_correct)
        .unwrap_or(original_correct);

    QuestionSnapshot {
        id: question.id,
        text: question.text.clone(),
        options: order.iter().map(|&i| question.options[i].clone()).collect(),
        correct_answer,
    }
}
