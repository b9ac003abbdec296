// src/engine/flow.rs

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, FixedOffset, Utc};
use rand::Rng;

use crate::{
    engine::{DRAW_CONTEXT, QuizEngine, QuizError, QuizResult, grader, selector, validity},
    models::{
        attempt::{
            AnswerSlot, Attempt, AttemptResult, AttemptSummary, CurrentQuestion, NewAttempt,
            Qualification, QuizStatus, SubmitOutcome,
        },
        question::{AnswerOption, PublicQuestion},
    },
};

/// Whether `begin` hands back `attempt` instead of starting a new one.
///
/// Open attempts are always continued. A finished attempt is only kept while it
/// holds a valid pass, and not at all when a restart was requested.
pub fn is_reusable(
    attempt: &Attempt,
    restart: bool,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> bool {
    if !attempt.is_finished {
        return true;
    }
    if restart {
        return false;
    }
    validity::qualification(attempt, now, offset).valid
}

impl QuizEngine {
    /// Returns the candidate's current attempt, or starts a new one.
    ///
    /// The boolean is true when an attempt was created by this call.
    pub async fn begin<R: Rng + Send>(
        &self,
        candidate_id: i64,
        restart: bool,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> QuizResult<(Attempt, bool)> {
        let restart = restart && self.settings.allow_restart;
        let offset = self.settings.utc_offset;
        let reusable = move |attempt: &Attempt| is_reusable(attempt, restart, now, offset);

        if let Some(existing) = self.store.find_most_recent(candidate_id).await? {
            if reusable(&existing) {
                return Ok((existing, false));
            }
        }

        let grouped = self.catalog.active_questions(DRAW_CONTEXT).await?;
        let pools = selector::pools_from(&grouped);
        let target = usize::try_from(self.settings.question_count).unwrap_or(0);
        let question_ids = selector::select_questions(&pools, target, &HashSet::new(), rng);

        if question_ids.is_empty() {
            tracing::warn!("Entrance quiz requested by candidate {} but no questions are available", candidate_id);
            return Err(QuizError::NoQuestionsAvailable);
        }
        if question_ids.len() < target {
            tracing::warn!(
                "Only {} of {} questions available for the entrance quiz",
                question_ids.len(),
                target
            );
        }

        let first_current = rng.random_range(0..question_ids.len());
        let new = NewAttempt {
            candidate_id,
            started_at: now,
            question_ids,
            first_current,
        };

        let (attempt, created) = self.store.create_if_absent(new, &reusable).await?;
        if created {
            tracing::info!(
                attempt_id = attempt.id,
                candidate_id,
                questions = attempt.target_count,
                "Entrance quiz attempt started"
            );
        }
        Ok((attempt, created))
    }

    /// The question presented right now. Picks one when nothing is presented yet.
    pub async fn current_question<R: Rng + Send>(
        &self,
        candidate_id: i64,
        attempt_id: i64,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> QuizResult<CurrentQuestion> {
        let attempt = self.load(candidate_id, attempt_id, now).await?;
        if attempt.is_finished {
            return Err(QuizError::AttemptFinished);
        }

        let slots = self.store.slots(attempt.id).await?;
        if slots.is_empty() {
            return Err(QuizError::NoQuestionAvailable);
        }

        let attempt = self.advance_with(attempt, &slots, false, rng).await?;
        self.present(&attempt, &slots).await
    }

    /// Moves the attempt to another unanswered slot. No-op on finished attempts.
    pub async fn advance<R: Rng + Send>(
        &self,
        candidate_id: i64,
        attempt_id: i64,
        force: bool,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> QuizResult<Attempt> {
        let attempt = self.load(candidate_id, attempt_id, now).await?;
        if attempt.is_finished {
            return Ok(attempt);
        }
        let slots = self.store.slots(attempt.id).await?;
        self.advance_with(attempt, &slots, force, rng).await
    }

    /// Shows a different question. The last remaining question is offered again.
    pub async fn skip<R: Rng + Send>(
        &self,
        candidate_id: i64,
        attempt_id: i64,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> QuizResult<CurrentQuestion> {
        let attempt = self.load(candidate_id, attempt_id, now).await?;
        if attempt.is_finished {
            return Err(QuizError::AttemptFinished);
        }

        let slots = self.store.slots(attempt.id).await?;
        let attempt = self.advance_with(attempt, &slots, true, rng).await?;
        self.present(&attempt, &slots).await
    }

    /// Records `choice` for the current slot.
    ///
    /// A choice other than A, B, C or D is a skip. When `slot_id` is given and no
    /// longer matches the current slot, the submission is stale and nothing is written.
    pub async fn record_answer<R: Rng + Send>(
        &self,
        candidate_id: i64,
        attempt_id: i64,
        choice: Option<&str>,
        slot_id: Option<i64>,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> QuizResult<SubmitOutcome> {
        let attempt = self.load(candidate_id, attempt_id, now).await?;
        if attempt.is_finished {
            return Err(QuizError::AttemptFinished);
        }

        let mut slots = self.store.slots(attempt.id).await?;

        let Some(option) = choice.and_then(AnswerOption::parse) else {
            tracing::debug!("Attempt {}: choice {:?} treated as skip", attempt.id, choice);
            let attempt = self.advance_with(attempt, &slots, true, rng).await?;
            return Ok(SubmitOutcome::NextQuestion(
                self.present(&attempt, &slots).await?,
            ));
        };

        // the current slot takes the answer even when already answered
        let attempt = if attempt.current_slot_id.is_some() {
            attempt
        } else {
            self.advance_with(attempt, &slots, false, rng).await?
        };
        let Some(current) = attempt.current_slot_id else {
            return Err(QuizError::NoQuestionAvailable);
        };

        if slot_id.is_some_and(|claimed| claimed != current) {
            tracing::debug!("Attempt {}: stale submission for slot {:?} ignored", attempt.id, slot_id);
            return Ok(SubmitOutcome::NextQuestion(
                self.present(&attempt, &slots).await?,
            ));
        }

        let recorded = self.store.record_answer(attempt.id, current, option).await?;
        if !recorded.newly_answered {
            tracing::debug!("Attempt {}: answer for slot {} replaced with {}", attempt.id, current, option);
        }
        if let Some(slot) = slots.iter_mut().find(|s| s.id == current) {
            slot.answer = Some(option);
        }

        let attempt = recorded.attempt;
        if attempt.answered_count >= attempt.target_count {
            let attempt = self.complete(attempt, now).await?;
            return Ok(SubmitOutcome::Finished(result_of(&attempt, now, self.settings.utc_offset)));
        }

        let attempt = self.advance_with(attempt, &slots, false, rng).await?;
        Ok(SubmitOutcome::NextQuestion(
            self.present(&attempt, &slots).await?,
        ))
    }

    /// Final result of a finished attempt.
    pub async fn result(
        &self,
        candidate_id: i64,
        attempt_id: i64,
        now: DateTime<Utc>,
    ) -> QuizResult<AttemptResult> {
        let attempt = self.load(candidate_id, attempt_id, now).await?;
        if !attempt.is_finished {
            return Err(QuizError::AttemptNotFinished);
        }
        Ok(result_of(&attempt, now, self.settings.utc_offset))
    }

    /// Whether the candidate currently holds a valid pass. No pass means not qualified.
    pub async fn qualification(
        &self,
        candidate_id: i64,
        now: DateTime<Utc>,
    ) -> QuizResult<Qualification> {
        Ok(self
            .store
            .find_most_recent_passed(candidate_id)
            .await?
            .map(|attempt| validity::qualification(&attempt, now, self.settings.utc_offset))
            .unwrap_or_else(Qualification::none))
    }

    pub async fn status(&self, candidate_id: i64, now: DateTime<Utc>) -> QuizResult<QuizStatus> {
        let available = self.catalog.is_available(DRAW_CONTEXT).await?;
        let latest = self.store.find_most_recent(candidate_id).await?;
        let qualification = self.qualification(candidate_id, now).await?;

        Ok(QuizStatus {
            available,
            question_count: self.settings.question_count,
            pass_percentage: self.settings.pass_percentage,
            time_limit_minutes: self.settings.time_limit_minutes,
            latest_attempt: latest.as_ref().map(AttemptSummary::from),
            qualification,
        })
    }

    /// Fetches an attempt owned by `candidate_id`. An attempt whose slots are all
    /// answered but which was never finished is graded on the way.
    async fn load(
        &self,
        candidate_id: i64,
        attempt_id: i64,
        now: DateTime<Utc>,
    ) -> QuizResult<Attempt> {
        let attempt = self
            .store
            .find_attempt(attempt_id)
            .await?
            .filter(|a| a.candidate_id == candidate_id)
            .ok_or(QuizError::AttemptNotFound)?;

        if attempt.awaits_grading() {
            return self.complete(attempt, now).await;
        }
        Ok(attempt)
    }

    /// The finishing transition: grade once and stamp the finish time.
    async fn complete(&self, attempt: Attempt, now: DateTime<Utc>) -> QuizResult<Attempt> {
        let slots = self.store.slots(attempt.id).await?;
        let question_ids: Vec<i64> = slots.iter().map(|s| s.question_id).collect();
        let answer_key: HashMap<i64, AnswerOption> = self
            .catalog
            .questions_by_ids(&question_ids)
            .await?
            .into_iter()
            .map(|(id, question)| (id, question.correct))
            .collect();

        let outcome = grader::grade(
            &slots,
            &answer_key,
            attempt.target_count,
            self.settings.pass_percentage,
        );

        let finished = self
            .store
            .finish_attempt(attempt.id, now, outcome.correct_count, outcome.passed)
            .await?;

        tracing::info!(
            attempt_id = finished.id,
            candidate_id = finished.candidate_id,
            correct = finished.correct_count,
            total = finished.target_count,
            passed = finished.passed,
            "Entrance quiz attempt finished"
        );
        Ok(finished)
    }

    /// Picks a new current slot among the unanswered ones, other than the present one
    /// when possible. Without `force`, an unanswered current slot is kept.
    async fn advance_with<R: Rng + Send>(
        &self,
        attempt: Attempt,
        slots: &[AnswerSlot],
        force: bool,
        rng: &mut R,
    ) -> QuizResult<Attempt> {
        if attempt.is_finished {
            return Ok(attempt);
        }

        let current = attempt.current_slot_id;
        let current_open = current
            .and_then(|id| slots.iter().find(|s| s.id == id))
            .filter(|s| !s.is_answered())
            .map(|s| s.id);

        if !force && current_open.is_some() {
            return Ok(attempt);
        }

        let others: Vec<i64> = slots
            .iter()
            .filter(|s| !s.is_answered() && Some(s.id) != current)
            .map(|s| s.id)
            .collect();

        let next = if others.is_empty() {
            current_open
        } else {
            Some(others[rng.random_range(0..others.len())])
        };

        if next == current {
            return Ok(attempt);
        }
        self.store.set_current_slot(attempt.id, next).await
    }

    async fn present(
        &self,
        attempt: &Attempt,
        slots: &[AnswerSlot],
    ) -> QuizResult<CurrentQuestion> {
        let slot = attempt
            .current_slot_id
            .and_then(|id| slots.iter().find(|s| s.id == id))
            .ok_or(QuizError::NoQuestionAvailable)?;

        let questions = self.catalog.questions_by_ids(&[slot.question_id]).await?;
        let question = questions.get(&slot.question_id).ok_or_else(|| {
            QuizError::Corrupt(format!(
                "question {} of slot {} is missing",
                slot.question_id, slot.id
            ))
        })?;

        Ok(CurrentQuestion {
            attempt_id: attempt.id,
            slot_id: slot.id,
            number: (attempt.answered_count + 1).min(attempt.target_count),
            target_count: attempt.target_count,
            can_skip: attempt.answered_count + 1 < attempt.target_count,
            question: PublicQuestion::from(question),
        })
    }
}

fn result_of(attempt: &Attempt, now: DateTime<Utc>, offset: FixedOffset) -> AttemptResult {
    AttemptResult {
        attempt_id: attempt.id,
        correct_count: attempt.correct_count,
        total: attempt.target_count,
        passed: attempt.passed,
        finished_at: attempt.finished_at,
        qualification: validity::qualification(attempt, now, offset),
    }
}
