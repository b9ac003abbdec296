// src/models/stats.rs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::question::AnswerOption;

/// How often one option of one question was chosen, across all attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerTally {
    pub question_id: i64,
    pub option: AnswerOption,
    pub count: i64,
}

/// Per-question answer distribution for the statistics page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionAnswerStats {
    pub question_id: i64,
    pub category_id: Option<i64>,
    pub text: String,
    pub correct: AnswerOption,

    /// "exam", "exam & quiz" or "quiz".
    pub usage: String,

    pub count_a: i64,
    pub count_b: i64,
    pub count_c: i64,
    pub count_d: i64,

    /// Rounded percentages per option, absent when nobody answered.
    pub percentages: Option<[i64; 4]>,

    pub total_answers: i64,
    pub wrong_answers: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerStatistics {
    /// Number of recorded answers over all questions.
    pub answer_count: i64,
    pub questions: Vec<QuestionAnswerStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptStatistics {
    pub started: i64,
    pub unique_candidates: i64,

    /// Finished attempts with at least one correct answer.
    pub completed: i64,
    pub completed_percentage: i64,
    pub passed: i64,
    pub passed_percentage: i64,
    pub average_correct: Option<i64>,
}

/// A candidate who failed and has never passed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailedCandidate {
    pub candidate_id: i64,
    pub total_correct: i64,
    pub total_wrong: i64,
    pub times_failed: i64,
    pub last_attempt: NaiveDate,
}

#[derive(Debug, Deserialize, Validate)]
pub struct FailedListParams {
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<usize>,
}
