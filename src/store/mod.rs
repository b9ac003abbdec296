// src/store/mod.rs

//! Typed repository seams of the quiz engine.
//!
//! `PgStore` is the production implementation. `MemoryStore` keeps everything in
//! process and backs the tests.

pub mod memory;
pub mod postgres;

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    engine::QuizResult,
    models::{
        attempt::{AnswerSlot, Attempt, NewAttempt, RecordedAnswer},
        question::{AnswerOption, CategoryKey, Question, QuizContext},
        stats::AnswerTally,
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Decides whether an existing attempt is handed back instead of creating a new one.
pub type ReusePredicate<'a> = &'a (dyn Fn(&Attempt) -> bool + Send + Sync);

/// Read-only view over the questions owned by the content store.
#[async_trait]
pub trait QuestionCatalog: Send + Sync {
    /// Active questions eligible for `context`, grouped by category.
    async fn active_questions(
        &self,
        context: QuizContext,
    ) -> QuizResult<BTreeMap<CategoryKey, Vec<Question>>>;

    /// Looks up questions regardless of their current flags.
    async fn questions_by_ids(&self, ids: &[i64]) -> QuizResult<HashMap<i64, Question>>;

    /// Active questions used by the quiz, the exam, or both; ordered by category and id.
    async fn questions_in_use(&self) -> QuizResult<Vec<Question>>;

    async fn is_available(&self, context: QuizContext) -> QuizResult<bool> {
        Ok(self
            .active_questions(context)
            .await?
            .values()
            .any(|questions| !questions.is_empty()))
    }
}

/// Persistence of attempts and their answer slots.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn find_attempt(&self, attempt_id: i64) -> QuizResult<Option<Attempt>>;

    /// The most recently started attempt of a candidate, open or finished.
    async fn find_most_recent(&self, candidate_id: i64) -> QuizResult<Option<Attempt>>;

    /// The most recently finished attempt of a candidate that passed.
    async fn find_most_recent_passed(&self, candidate_id: i64) -> QuizResult<Option<Attempt>>;

    /// Atomically returns the candidate's most recent attempt when `reusable` accepts it,
    /// otherwise creates `new` with its slots. Concurrent calls for one candidate never
    /// both report `created = true`.
    async fn create_if_absent(
        &self,
        new: NewAttempt,
        reusable: ReusePredicate<'_>,
    ) -> QuizResult<(Attempt, bool)>;

    /// Slots of an attempt in creation order.
    async fn slots(&self, attempt_id: i64) -> QuizResult<Vec<AnswerSlot>>;

    /// Moves the current-slot pointer. Finished attempts are returned unchanged.
    async fn set_current_slot(&self, attempt_id: i64, slot_id: Option<i64>)
    -> QuizResult<Attempt>;

    /// Writes `answer` into the slot. `answered_count` only grows when the slot was unanswered.
    async fn record_answer(
        &self,
        attempt_id: i64,
        slot_id: i64,
        answer: AnswerOption,
    ) -> QuizResult<RecordedAnswer>;

    /// One-time finishing write. A second call returns the already finished attempt untouched.
    async fn finish_attempt(
        &self,
        attempt_id: i64,
        finished_at: DateTime<Utc>,
        correct_count: i32,
        passed: bool,
    ) -> QuizResult<Attempt>;

    /// Answer counts per question and option over all recorded answers.
    async fn answer_tallies(&self) -> QuizResult<Vec<AnswerTally>>;

    async fn all_attempts(&self) -> QuizResult<Vec<Attempt>>;
}
