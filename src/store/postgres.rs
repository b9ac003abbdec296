// src/store/postgres.rs

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::{
    engine::{QuizError, QuizResult},
    models::{
        attempt::{AnswerSlot, Attempt, NewAttempt, RecordedAnswer},
        question::{AnswerOption, CategoryKey, Question, QuizContext},
        stats::AnswerTally,
    },
    store::{AttemptStore, QuestionCatalog, ReusePredicate},
};

const ATTEMPT_COLUMNS: &str = "id, candidate_id, started_at, finished_at, target_count, \
     answered_count, current_slot_id, is_finished, correct_count, passed";

const QUESTION_COLUMNS: &str = "id, category_id, text, option_a, option_b, option_c, option_d, \
     correct_option, is_active, use_for_quiz, use_for_exam";

/// Helper struct for reading the 'questions' table.
#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    category_id: Option<i64>,
    text: String,
    option_a: String,
    option_b: String,
    option_c: String,
    option_d: String,
    correct_option: String,
    is_active: bool,
    use_for_quiz: bool,
    use_for_exam: bool,
}

impl TryFrom<QuestionRow> for Question {
    type Error = QuizError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        let correct = AnswerOption::parse(row.correct_option.trim()).ok_or_else(|| {
            QuizError::Corrupt(format!(
                "question {} has correct option '{}'",
                row.id, row.correct_option
            ))
        })?;

        Ok(Question {
            id: row.id,
            category_id: row.category_id,
            text: row.text,
            option_a: row.option_a,
            option_b: row.option_b,
            option_c: non_empty(row.option_c),
            option_d: non_empty(row.option_d),
            correct,
            is_active: row.is_active,
            eligible_for_quiz: row.use_for_quiz,
            eligible_for_exam: row.use_for_exam,
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Helper struct for reading the 'answer_slots' table.
#[derive(FromRow)]
struct SlotRow {
    id: i64,
    attempt_id: i64,
    question_id: i64,
    answer: Option<String>,
}

impl TryFrom<SlotRow> for AnswerSlot {
    type Error = QuizError;

    fn try_from(row: SlotRow) -> Result<Self, Self::Error> {
        let answer = match row.answer {
            None => None,
            Some(letter) => Some(AnswerOption::parse(letter.trim()).ok_or_else(|| {
                QuizError::Corrupt(format!("slot {} holds answer '{}'", row.id, letter))
            })?),
        };

        Ok(AnswerSlot {
            id: row.id,
            attempt_id: row.attempt_id,
            question_id: row.question_id,
            answer,
        })
    }
}

fn eligibility_column(context: QuizContext) -> &'static str {
    match context {
        QuizContext::Quiz => "use_for_quiz",
        QuizContext::Exam => "use_for_exam",
    }
}

/// Postgres implementation of both repository traits.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuestionCatalog for PgStore {
    async fn active_questions(
        &self,
        context: QuizContext,
    ) -> QuizResult<BTreeMap<CategoryKey, Vec<Question>>> {
        let sql = format!(
            "SELECT {QUESTION_COLUMNS} FROM questions \
             WHERE is_active AND {} \
             ORDER BY category_id NULLS FIRST, id",
            eligibility_column(context)
        );

        let rows: Vec<QuestionRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        let mut grouped: BTreeMap<CategoryKey, Vec<Question>> = BTreeMap::new();
        for row in rows {
            let question = Question::try_from(row)?;
            grouped.entry(question.category()).or_default().push(question);
        }
        Ok(grouped)
    }

    async fn questions_by_ids(&self, ids: &[i64]) -> QuizResult<HashMap<i64, Question>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ANY($1)");
        let rows: Vec<QuestionRow> = sqlx::query_as(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| Question::try_from(row).map(|q| (q.id, q)))
            .collect()
    }

    async fn questions_in_use(&self) -> QuizResult<Vec<Question>> {
        let sql = format!(
            "SELECT {QUESTION_COLUMNS} FROM questions \
             WHERE is_active AND (use_for_quiz OR use_for_exam) \
             ORDER BY category_id NULLS FIRST, id"
        );
        let rows: Vec<QuestionRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(Question::try_from).collect()
    }

    async fn is_available(&self, context: QuizContext) -> QuizResult<bool> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM questions WHERE is_active AND {})",
            eligibility_column(context)
        );
        let available: bool = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(available)
    }
}

#[async_trait]
impl AttemptStore for PgStore {
    async fn find_attempt(&self, attempt_id: i64) -> QuizResult<Option<Attempt>> {
        let sql = format!("SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts WHERE id = $1");
        let attempt = sqlx::query_as::<_, Attempt>(&sql)
            .bind(attempt_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(attempt)
    }

    async fn find_most_recent(&self, candidate_id: i64) -> QuizResult<Option<Attempt>> {
        let sql = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts \
             WHERE candidate_id = $1 \
             ORDER BY started_at DESC, id DESC LIMIT 1"
        );
        let attempt = sqlx::query_as::<_, Attempt>(&sql)
            .bind(candidate_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(attempt)
    }

    async fn find_most_recent_passed(&self, candidate_id: i64) -> QuizResult<Option<Attempt>> {
        let sql = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts \
             WHERE candidate_id = $1 AND is_finished AND passed \
             ORDER BY finished_at DESC, id DESC LIMIT 1"
        );
        let attempt = sqlx::query_as::<_, Attempt>(&sql)
            .bind(candidate_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(attempt)
    }

    /// Serializes concurrent begins of one candidate with a transaction-scoped advisory lock.
    async fn create_if_absent(
        &self,
        new: NewAttempt,
        reusable: ReusePredicate<'_>,
    ) -> QuizResult<(Attempt, bool)> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(new.candidate_id)
            .execute(&mut *tx)
            .await?;

        let sql = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts \
             WHERE candidate_id = $1 \
             ORDER BY started_at DESC, id DESC LIMIT 1"
        );
        let existing = sqlx::query_as::<_, Attempt>(&sql)
            .bind(new.candidate_id)
            .fetch_optional(&mut *tx)
            .await?;

        if let Some(existing) = existing {
            if reusable(&existing) {
                tx.commit().await?;
                return Ok((existing, false));
            }
        }

        let attempt_id: i64 = sqlx::query_scalar(
            "INSERT INTO quiz_attempts (candidate_id, started_at, target_count) \
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(new.candidate_id)
        .bind(new.started_at)
        .bind(new.question_ids.len() as i32)
        .fetch_one(&mut *tx)
        .await?;

        let mut current_slot_id = None;
        if !new.question_ids.is_empty() {
            let mut query_builder =
                QueryBuilder::<Postgres>::new("INSERT INTO answer_slots (attempt_id, question_id) ");
            query_builder.push_values(&new.question_ids, |mut row, question_id| {
                row.push_bind(attempt_id).push_bind(*question_id);
            });
            query_builder.build().execute(&mut *tx).await?;

            if let Some(first) = new.question_ids.get(new.first_current) {
                current_slot_id = sqlx::query_scalar::<_, i64>(
                    "SELECT id FROM answer_slots WHERE attempt_id = $1 AND question_id = $2",
                )
                .bind(attempt_id)
                .bind(*first)
                .fetch_optional(&mut *tx)
                .await?;
            }
        }

        let sql = format!(
            "UPDATE quiz_attempts SET current_slot_id = $2 WHERE id = $1 RETURNING {ATTEMPT_COLUMNS}"
        );
        let attempt = sqlx::query_as::<_, Attempt>(&sql)
            .bind(attempt_id)
            .bind(current_slot_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((attempt, true))
    }

    async fn slots(&self, attempt_id: i64) -> QuizResult<Vec<AnswerSlot>> {
        let rows: Vec<SlotRow> = sqlx::query_as(
            "SELECT id, attempt_id, question_id, answer FROM answer_slots \
             WHERE attempt_id = $1 ORDER BY id",
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AnswerSlot::try_from).collect()
    }

    async fn set_current_slot(
        &self,
        attempt_id: i64,
        slot_id: Option<i64>,
    ) -> QuizResult<Attempt> {
        let sql = format!(
            "UPDATE quiz_attempts SET current_slot_id = $2 \
             WHERE id = $1 AND NOT is_finished RETURNING {ATTEMPT_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Attempt>(&sql)
            .bind(attempt_id)
            .bind(slot_id)
            .fetch_optional(&self.pool)
            .await?;

        match updated {
            Some(attempt) => Ok(attempt),
            None => self
                .find_attempt(attempt_id)
                .await?
                .ok_or(QuizError::AttemptNotFound),
        }
    }

    /// The slot row is locked before the write, so the increment only happens for the
    /// transition from unanswered to answered, even under concurrent submissions.
    async fn record_answer(
        &self,
        attempt_id: i64,
        slot_id: i64,
        answer: AnswerOption,
    ) -> QuizResult<RecordedAnswer> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts WHERE id = $1 FOR UPDATE");
        let attempt = sqlx::query_as::<_, Attempt>(&sql)
            .bind(attempt_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(QuizError::AttemptNotFound)?;

        if attempt.is_finished {
            return Err(QuizError::AttemptFinished);
        }

        let prior: Option<String> = sqlx::query_scalar::<_, Option<String>>(
            "SELECT answer FROM answer_slots WHERE id = $1 AND attempt_id = $2 FOR UPDATE",
        )
        .bind(slot_id)
        .bind(attempt_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            QuizError::Corrupt(format!("slot {slot_id} is not part of attempt {attempt_id}"))
        })?;

        sqlx::query("UPDATE answer_slots SET answer = $2 WHERE id = $1")
            .bind(slot_id)
            .bind(answer.as_str())
            .execute(&mut *tx)
            .await?;

        let newly_answered = prior.is_none();
        let attempt = if newly_answered {
            let sql = format!(
                "UPDATE quiz_attempts SET answered_count = answered_count + 1 \
                 WHERE id = $1 AND answered_count < target_count RETURNING {ATTEMPT_COLUMNS}"
            );
            sqlx::query_as::<_, Attempt>(&sql)
                .bind(attempt_id)
                .fetch_optional(&mut *tx)
                .await?
                .unwrap_or(attempt)
        } else {
            attempt
        };

        tx.commit().await?;
        Ok(RecordedAnswer {
            attempt,
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
        let sql = format!(
            "UPDATE quiz_attempts \
             SET is_finished = TRUE, finished_at = $2, correct_count = $3, passed = $4, \
                 current_slot_id = NULL \
             WHERE id = $1 AND NOT is_finished AND answered_count >= target_count \
             RETURNING {ATTEMPT_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Attempt>(&sql)
            .bind(attempt_id)
            .bind(finished_at)
            .bind(correct_count)
            .bind(passed)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(attempt) = updated {
            return Ok(attempt);
        }

        match self.find_attempt(attempt_id).await? {
            Some(attempt) if attempt.is_finished => Ok(attempt),
            Some(_) => Err(QuizError::AttemptNotFinished),
            None => Err(QuizError::AttemptNotFound),
        }
    }

    async fn answer_tallies(&self) -> QuizResult<Vec<AnswerTally>> {
        let rows: Vec<(i64, String, i64)> = sqlx::query_as(
            "SELECT question_id, answer, COUNT(*) FROM answer_slots \
             WHERE answer IS NOT NULL \
             GROUP BY question_id, answer \
             ORDER BY question_id, answer",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(question_id, letter, count)| {
                let option = AnswerOption::parse(letter.trim()).ok_or_else(|| {
                    QuizError::Corrupt(format!("question {question_id} tallied answer '{letter}'"))
                })?;
                Ok(AnswerTally {
                    question_id,
                    option,
                    count,
                })
            })
            .collect()
    }

    async fn all_attempts(&self) -> QuizResult<Vec<Attempt>> {
        let sql = format!("SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts ORDER BY id");
        let attempts = sqlx::query_as::<_, Attempt>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(attempts)
    }
}
