// src/engine/mod.rs

//! The entrance quiz: selection, the question flow, grading and validity.

pub mod error;
pub mod flow;
pub mod grader;
pub mod selector;
pub mod stats;
pub mod validity;

use std::sync::Arc;

use chrono::{FixedOffset, Offset, Utc};

use crate::{
    models::question::QuizContext,
    store::{AttemptStore, QuestionCatalog},
};

pub use error::{QuizError, QuizResult};

/// Questions for the entrance quiz are drawn from the exam-eligible pool.
pub const DRAW_CONTEXT: QuizContext = QuizContext::Exam;

/// Tunables of the entrance quiz.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizSettings {
    /// Number of questions a new attempt asks for.
    pub question_count: i32,

    /// Minimum share of correct answers, in percent of the attempt's question count.
    pub pass_percentage: f64,

    /// Shown to candidates; not enforced.
    pub time_limit_minutes: u32,

    /// Allows a candidate with a valid pass to start over (test servers only).
    pub allow_restart: bool,

    /// Clock used for finish dates and "today" in the validity check.
    pub utc_offset: FixedOffset,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            question_count: 20,
            pass_percentage: 70.0,
            time_limit_minutes: 30,
            allow_restart: false,
            utc_offset: Utc.fix(),
        }
    }
}

/// Drives attempts through their life cycle on top of the two repository traits.
#[derive(Clone)]
pub struct QuizEngine {
    catalog: Arc<dyn QuestionCatalog>,
    store: Arc<dyn AttemptStore>,
    settings: QuizSettings,
}

impl QuizEngine {
    pub fn new(
        catalog: Arc<dyn QuestionCatalog>,
        store: Arc<dyn AttemptStore>,
        settings: QuizSettings,
    ) -> Self {
        Self {
            catalog,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &QuizSettings {
        &self.settings
    }
}
