// src/session/scoring.rs

use std::collections::BTreeMap;

use crate::models::question::Question;

/// Returns (correct_count, score).
///
/// A question counts as correct when its recorded option equals `correct_option`.
/// Each correct answer is worth `points_per_correct`.
pub fn calculate_score<'a>(
    questions: impl IntoIterator<Item = &'a Question>,
    answers: &BTreeMap<i64, usize>,
    points_per_correct: u32,
) -> (u32, u32) {
    let correct_count = questions
        .into_iter()
        .filter(|q| answers.get(&q.id) == Some(&q.correct_option))
        .count() as u32;

    (correct_count, correct_count.saturating_mul(points_per_correct))
}
