// src/store/memory.rs

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    engine::{QuizError, QuizResult},
    models::{
        attempt::{AnswerSlot, Attempt, NewAttempt, RecordedAnswer},
        question::{AnswerOption, CategoryKey, Question, QuizContext},
        stats::AnswerTally,
    },
    store::{AttemptStore, QuestionCatalog, ReusePredicate},
};

#[derive(Debug, Default)]
struct MemoryState {
    questions: BTreeMap<i64, Question>,
    attempts: BTreeMap<i64, Attempt>,
    slots: BTreeMap<i64, AnswerSlot>,
    next_attempt_id: i64,
    next_slot_id: i64,
}

impl MemoryState {
    fn most_recent(&self, candidate_id: i64) -> Option<&Attempt> {
        self.attempts
            .values()
            .filter(|a| a.candidate_id == candidate_id)
            .max_by_key(|a| (a.started_at, a.id))
    }
}

/// In-process store. A single mutex serializes every operation, which makes
/// `create_if_absent` trivially atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_questions(questions: impl IntoIterator<Item = Question>) -> Self {
        let state = MemoryState {
            questions: questions.into_iter().map(|q| (q.id, q)).collect(),
            ..MemoryState::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    pub async fn insert_question(&self, question: Question) {
        self.state.lock().await.questions.insert(question.id, question);
    }

    pub async fn remove_all_questions(&self) {
        self.state.lock().await.questions.clear();
    }

    /// Overwrites a stored attempt, e.g. to age a pass in tests.
    pub async fn put_attempt(&self, attempt: Attempt) {
        self.state.lock().await.attempts.insert(attempt.id, attempt);
    }

    pub async fn attempt_count(&self) -> usize {
        self.state.lock().await.attempts.len()
    }
}

#[async_trait]
impl QuestionCatalog for MemoryStore {
    async fn active_questions(
        &self,
        context: QuizContext,
    ) -> QuizResult<BTreeMap<CategoryKey, Vec<Question>>> {
        let state = self.state.lock().await;
        let mut grouped: BTreeMap<CategoryKey, Vec<Question>> = BTreeMap::new();
        for question in state.questions.values().filter(|q| q.is_eligible(context)) {
            grouped
                .entry(question.category())
                .or_default()
                .push(question.clone());
        }
        Ok(grouped)
    }

    async fn questions_by_ids(&self, ids: &[i64]) -> QuizResult<HashMap<i64, Question>> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.questions.get(id).map(|q| (*id, q.clone())))
            .collect())
    }

    async fn questions_in_use(&self) -> QuizResult<Vec<Question>> {
        let state = self.state.lock().await;
        let mut questions: Vec<Question> = state
            .questions
            .values()
            .filter(|q| q.is_active && (q.eligible_for_exam || q.eligible_for_quiz))
            .cloned()
            .collect();
        questions.sort_by_key(|q| (q.category_id, q.id));
        Ok(questions)
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn find_attempt(&self, attempt_id: i64) -> QuizResult<Option<Attempt>> {
        Ok(self.state.lock().await.attempts.get(&attempt_id).cloned())
    }

    async fn find_most_recent(&self, candidate_id: i64) -> QuizResult<Option<Attempt>> {
        Ok(self.state.lock().await.most_recent(candidate_id).cloned())
    }

    async fn find_most_recent_passed(&self, candidate_id: i64) -> QuizResult<Option<Attempt>> {
        let state = self.state.lock().await;
        Ok(state
            .attempts
            .values()
            .filter(|a| a.candidate_id == candidate_id && a.is_finished && a.passed)
            .max_by_key(|a| (a.finished_at, a.id))
            .cloned())
    }

    async fn create_if_absent(
        &self,
        new: NewAttempt,
        reusable: ReusePredicate<'_>,
    ) -> QuizResult<(Attempt, bool)> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        if let Some(existing) = state.most_recent(new.candidate_id) {
            if reusable(existing) {
                return Ok((existing.clone(), false));
            }
        }

        state.next_attempt_id += 1;
        let attempt_id = state.next_attempt_id;

        let mut slot_ids = Vec::with_capacity(new.question_ids.len());
        for question_id in &new.question_ids {
            state.next_slot_id += 1;
            let slot = AnswerSlot {
                id: state.next_slot_id,
                attempt_id,
                question_id: *question_id,
                answer: None,
            };
            slot_ids.push(slot.id);
            state.slots.insert(slot.id, slot);
        }

        let attempt = Attempt {
            id: attempt_id,
            candidate_id: new.candidate_id,
            started_at: new.started_at,
            finished_at: None,
            target_count: slot_ids.len() as i32,
            answered_count: 0,
            current_slot_id: slot_ids.get(new.first_current).copied(),
            is_finished: false,
            correct_count: 0,
            passed: false,
        };
        state.attempts.insert(attempt_id, attempt.clone());

        Ok((attempt, true))
    }

    async fn slots(&self, attempt_id: i64) -> QuizResult<Vec<AnswerSlot>> {
        let state = self.state.lock().await;
        Ok(state
            .slots
            .values()
            .filter(|s| s.attempt_id == attempt_id)
            .cloned()
            .collect())
    }

    async fn set_current_slot(
        &self,
        attempt_id: i64,
        slot_id: Option<i64>,
    ) -> QuizResult<Attempt> {
        let mut state = self.state.lock().await;
        let attempt = state
            .attempts
            .get_mut(&attempt_id)
            .ok_or(QuizError::AttemptNotFound)?;

        if !attempt.is_finished {
            attempt.current_slot_id = slot_id;
        }
        Ok(attempt.clone())
    }

    async fn record_answer(
        &self,
        attempt_id: i64,
        slot_id: i64,
        answer: AnswerOption,
    ) -> QuizResult<RecordedAnswer> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let attempt = state
            .attempts
            .get_mut(&attempt_id)
            .ok_or(QuizError::AttemptNotFound)?;
        if attempt.is_finished {
            return Err(QuizError::AttemptFinished);
        }

        let slot = state
            .slots
            .get_mut(&slot_id)
            .filter(|s| s.attempt_id == attempt_id)
            .ok_or_else(|| {
                QuizError::Corrupt(format!("slot {slot_id} is not part of attempt {attempt_id}"))
            })?;

        let newly_answered = slot.answer.is_none();
        slot.answer = Some(answer);
        if newly_answered && attempt.answered_count < attempt.target_count {
            attempt.answered_count += 1;
        }

        Ok(RecordedAnswer {
            attempt: attempt.clone(),
            newly_answered,
        })
    }

    async fn finish_attempt(
        &self,
        attempt_id: i64,
        finished_at: DateTime<Utc>,
        correct_count: i32,
        passed: bool,
    ) -> QuizResult<Attempt> {
        let mut state = self.state.lock().await;
        let attempt = state
            .attempts
            .get_mut(&attempt_id)
            .ok_or(QuizError::AttemptNotFound)?;

        if attempt.is_finished {
            return Ok(attempt.clone());
        }
        if attempt.answered_count < attempt.target_count {
            return Err(QuizError::AttemptNotFinished);
        }

        attempt.is_finished = true;
        attempt.finished_at = Some(finished_at);
        attempt.correct_count = correct_count;
        attempt.passed = passed;
        attempt.current_slot_id = None;
        Ok(attempt.clone())
    }

    async fn answer_tallies(&self) -> QuizResult<Vec<AnswerTally>> {
        let state = self.state.lock().await;
        let mut counts: BTreeMap<(i64, AnswerOption), i64> = BTreeMap::new();
        for slot in state.slots.values() {
            if let Some(answer) = slot.answer {
                *counts.entry((slot.question_id, answer)).or_default() += 1;
            }
        }
        Ok(counts
            .into_iter()
            .map(|((question_id, option), count)| AnswerTally {
                question_id,
                option,
                count,
            })
            .collect())
    }

    async fn all_attempts(&self) -> QuizResult<Vec<Attempt>> {
        Ok(self.state.lock().await.attempts.values().cloned().collect())
    }
}
