// src/models/attempt.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::question::{AnswerOption, PublicQuestion};

/// Represents the 'quiz_attempts' table: one candidate's run through the quiz.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Attempt {
    pub id: i64,
    pub candidate_id: i64,
    pub started_at: DateTime<Utc>,

    /// `None` while the attempt is open.
    pub finished_at: Option<DateTime<Utc>>,

    pub target_count: i32,
    pub answered_count: i32,

    /// The slot currently presented to the candidate.
    pub current_slot_id: Option<i64>,

    pub is_finished: bool,
    pub correct_count: i32,

    /// Only meaningful once `is_finished` is set.
    pub passed: bool,
}

impl Attempt {
    pub fn state(&self) -> AttemptState {
        if self.is_finished {
            AttemptState::Finished
        } else if self.answered_count == 0 {
            AttemptState::NotStarted
        } else {
            AttemptState::InProgress
        }
    }

    /// All slots answered but the finishing transition has not been written yet.
    pub fn awaits_grading(&self) -> bool {
        !self.is_finished && self.target_count > 0 && self.answered_count >= self.target_count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    NotStarted,
    InProgress,
    Finished,
}

/// Represents the 'answer_slots' table: one question position within an attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerSlot {
    pub id: i64,
    pub attempt_id: i64,
    pub question_id: i64,

    /// `None` until the candidate answers the slot.
    pub answer: Option<AnswerOption>,
}

impl AnswerSlot {
    pub fn is_answered(&self) -> bool {
        self.answer.is_some()
    }
}

/// Input for creating an attempt together with its pre-allocated slots.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub candidate_id: i64,
    pub started_at: DateTime<Utc>,

    /// Question ids in draw order.
    pub question_ids: Vec<i64>,

    /// Index into `question_ids` of the slot presented first.
    pub first_current: usize,
}

/// Result of an answer write, as seen by the store.
#[derive(Debug, Clone)]
pub struct RecordedAnswer {
    pub attempt: Attempt,

    /// True when the slot went from unanswered to answered.
    pub newly_answered: bool,
}

/// Request body for starting the quiz.
#[derive(Debug, Default, Deserialize)]
pub struct BeginRequest {
    /// Start over even when a valid pass exists. Honoured only when restarts are enabled.
    #[serde(default)]
    pub restart: bool,
}

/// Request body for submitting an answer. A missing body is a skip.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitAnswerRequest {
    /// The chosen letter. Anything other than A-D, of any length, is treated as a skip.
    pub choice: Option<String>,

    /// The slot the client believes it is answering. A mismatch marks a stale double submission.
    pub slot_id: Option<i64>,
}

/// Progress overview returned by `begin` and `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub attempt_id: i64,
    pub state: AttemptState,
    pub finished: bool,
    pub answered_count: i32,
    pub target_count: i32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub passed: Option<bool>,
}

impl From<&Attempt> for AttemptSummary {
    fn from(a: &Attempt) -> Self {
        AttemptSummary {
            attempt_id: a.id,
            state: a.state(),
            finished: a.is_finished,
            answered_count: a.answered_count,
            target_count: a.target_count,
            started_at: a.started_at,
            finished_at: a.finished_at,
            passed: a.is_finished.then_some(a.passed),
        }
    }
}

/// The question currently presented within an attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentQuestion {
    pub attempt_id: i64,
    pub slot_id: i64,

    /// 1-based position of this question in the attempt.
    pub number: i32,
    pub target_count: i32,

    /// False on the last remaining question.
    pub can_skip: bool,

    pub question: PublicQuestion,
}

/// Validity window of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Qualification {
    pub valid: bool,
    pub days_remaining: i64,
    pub expires_on: Option<NaiveDate>,
}

impl Qualification {
    pub fn none() -> Self {
        Qualification {
            valid: false,
            days_remaining: 0,
            expires_on: None,
        }
    }
}

/// Final result of a finished attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptResult {
    pub attempt_id: i64,
    pub correct_count: i32,
    pub total: i32,
    pub passed: bool,
    pub finished_at: Option<DateTime<Utc>>,
    pub qualification: Qualification,
}

/// Outcome of a submit: either the next question or the final result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    NextQuestion(CurrentQuestion),
    Finished(AttemptResult),
}

/// Landing view for a candidate: can the quiz be taken, and where do they stand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizStatus {
    pub available: bool,
    pub question_count: i32,
    pub pass_percentage: f64,
    pub time_limit_minutes: u32,
    pub latest_attempt: Option<AttemptSummary>,
    pub qualification: Qualification,
}
