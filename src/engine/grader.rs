// src/engine/grader.rs

use std::collections::HashMap;

use crate::models::{attempt::AnswerSlot, question::AnswerOption};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradeOutcome {
    pub correct_count: i32,
    pub passed: bool,
}

/// Counts the slots whose recorded answer matches the answer key.
/// Unanswered slots and slots whose question is missing from the key never count.
pub fn count_correct(slots: &[AnswerSlot], answer_key: &HashMap<i64, AnswerOption>) -> i32 {
    slots
        .iter()
        .filter(|slot| match (slot.answer, answer_key.get(&slot.question_id)) {
            (Some(given), Some(correct)) => given == *correct,
            _ => false,
        })
        .count() as i32
}

/// Percentage comparison in floating point, so 1 out of 2 (50%) fails a 70% threshold.
pub fn is_passing(correct_count: i32, target_count: i32, pass_percentage: f64) -> bool {
    if target_count <= 0 {
        return false;
    }
    (correct_count as f64 * 100.0) / target_count as f64 >= pass_percentage
}

pub fn grade(
    slots: &[AnswerSlot],
    answer_key: &HashMap<i64, AnswerOption>,
    target_count: i32,
    pass_percentage: f64,
) -> GradeOutcome {
    let correct_count = count_correct(slots, answer_key);
    GradeOutcome {
        correct_count,
        passed: is_passing(correct_count, target_count, pass_percentage),
    }
}
