// src/engine/stats.rs

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use chrono::FixedOffset;

use crate::{
    engine::{QuizEngine, QuizResult, validity},
    models::{
        attempt::Attempt,
        question::{AnswerOption, Question},
        stats::{
            AnswerStatistics, AnswerTally, AttemptStatistics, FailedCandidate,
            QuestionAnswerStats,
        },
    },
};

pub const DEFAULT_FAILED_LIMIT: usize = 100;

/// `part / whole` in percent, halves rounded to even; 0 when `whole` is 0.
fn percentage(part: i64, whole: i64) -> i64 {
    if whole <= 0 {
        return 0;
    }
    ((part as f64 * 100.0) / whole as f64).round_ties_even() as i64
}

fn usage_label(question: &Question) -> String {
    match (question.eligible_for_exam, question.eligible_for_quiz) {
        (true, true) => "exam & quiz".to_string(),
        (true, false) => "exam".to_string(),
        (false, _) => "quiz".to_string(),
    }
}

/// Answer distribution per question, the most often wrongly answered first.
pub fn answer_statistics(questions: &[Question], tallies: &[AnswerTally]) -> AnswerStatistics {
    let answer_count = tallies.iter().map(|t| t.count).sum();

    let mut counts: HashMap<i64, [i64; 4]> = HashMap::new();
    for tally in tallies {
        let idx = AnswerOption::ALL
            .iter()
            .position(|option| *option == tally.option)
            .unwrap_or_default();
        counts.entry(tally.question_id).or_default()[idx] += tally.count;
    }

    let mut rows: Vec<QuestionAnswerStats> = questions
        .iter()
        .map(|question| {
            let per_option = counts.get(&question.id).copied().unwrap_or_default();
            let total: i64 = per_option.iter().sum();
            let wrong: i64 = AnswerOption::ALL
                .iter()
                .zip(per_option)
                .filter(|(option, _)| **option != question.correct)
                .map(|(_, count)| count)
                .sum();
            let percentages = (total > 0).then(|| per_option.map(|count| percentage(count, total)));

            QuestionAnswerStats {
                question_id: question.id,
                category_id: question.category_id,
                text: question.text.clone(),
                correct: question.correct,
                usage: usage_label(question),
                count_a: per_option[0],
                count_b: per_option[1],
                count_c: per_option[2],
                count_d: per_option[3],
                percentages,
                total_answers: total,
                wrong_answers: wrong,
            }
        })
        .collect();

    rows.sort_by_key(|row| Reverse((row.wrong_answers, row.total_answers, row.question_id)));

    AnswerStatistics {
        answer_count,
        questions: rows,
    }
}

/// Summary over all attempts. An attempt counts as completed when it finished
/// with at least one correct answer.
pub fn attempt_statistics(attempts: &[Attempt]) -> AttemptStatistics {
    let started = attempts.len() as i64;
    let unique_candidates = attempts
        .iter()
        .map(|a| a.candidate_id)
        .collect::<HashSet<_>>()
        .len() as i64;

    let completed: Vec<&Attempt> = attempts
        .iter()
        .filter(|a| a.is_finished && a.correct_count > 0)
        .collect();
    let completed_count = completed.len() as i64;
    let passed = completed.iter().filter(|a| a.passed).count() as i64;
    let correct_sum: i64 = completed.iter().map(|a| i64::from(a.correct_count)).sum();

    AttemptStatistics {
        started,
        unique_candidates,
        completed: completed_count,
        completed_percentage: percentage(completed_count, started),
        passed,
        passed_percentage: percentage(passed, completed_count),
        average_correct: (completed_count > 0)
            .then(|| (correct_sum as f64 / completed_count as f64).round_ties_even() as i64),
    }
}

/// Candidates with failed attempts who never passed, newest last attempt first.
/// Attempt days are taken at `offset`.
pub fn failed_candidates(
    attempts: &[Attempt],
    limit: usize,
    offset: FixedOffset,
) -> Vec<FailedCandidate> {
    let ever_passed: HashSet<i64> = attempts
        .iter()
        .filter(|a| a.passed)
        .map(|a| a.candidate_id)
        .collect();

    let mut per_candidate: HashMap<i64, FailedCandidate> = HashMap::new();
    for attempt in attempts
        .iter()
        .filter(|a| a.is_finished && !a.passed && !ever_passed.contains(&a.candidate_id))
    {
        let day = validity::local_date(attempt.started_at, offset);
        let entry = per_candidate
            .entry(attempt.candidate_id)
            .or_insert_with(|| FailedCandidate {
                candidate_id: attempt.candidate_id,
                total_correct: 0,
                total_wrong: 0,
                times_failed: 0,
                last_attempt: day,
            });

        entry.total_correct += i64::from(attempt.correct_count);
        entry.total_wrong += i64::from(attempt.target_count - attempt.correct_count);
        entry.times_failed += 1;
        entry.last_attempt = entry.last_attempt.max(day);
    }

    let mut list: Vec<FailedCandidate> = per_candidate.into_values().collect();
    list.sort_by_key(|c| Reverse((c.last_attempt, c.candidate_id)));
    list.truncate(limit);
    list
}

impl QuizEngine {
    pub async fn answer_statistics(&self) -> QuizResult<AnswerStatistics> {
        let questions = self.catalog.questions_in_use().await?;
        let tallies = self.store.answer_tallies().await?;
        Ok(answer_statistics(&questions, &tallies))
    }

    pub async fn attempt_statistics(&self) -> QuizResult<AttemptStatistics> {
        Ok(attempt_statistics(&self.store.all_attempts().await?))
    }

    pub async fn failed_candidates(&self, limit: usize) -> QuizResult<Vec<FailedCandidate>> {
        Ok(failed_candidates(
            &self.store.all_attempts().await?,
            limit,
            self.settings.utc_offset,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Offset, TimeZone, Utc};

    fn question(id: i64, correct: AnswerOption, exam: bool, quiz: bool) -> Question {
        Question {
            id,
            category_id: Some(1),
            text: format!("Q{id}"),
            option_a: "a".to_string(),
            option_b: "b".to_string(),
            option_c: Some("c".to_string()),
            option_d: Some("d".to_string()),
            correct,
            is_active: true,
            eligible_for_quiz: quiz,
            eligible_for_exam: exam,
        }
    }

    fn tally(question_id: i64, option: AnswerOption, count: i64) -> AnswerTally {
        AnswerTally {
            question_id,
            option,
            count,
        }
    }

    fn attempt(id: i64, candidate_id: i64, day: u32, correct: i32, passed: bool) -> Attempt {
        let started_at = Utc.with_ymd_and_hms(2025, 3, day, 9, 0, 0).unwrap();
        Attempt {
            id,
            candidate_id,
            started_at,
            finished_at: Some(started_at),
            target_count: 20,
            answered_count: 20,
            current_slot_id: None,
            is_finished: true,
            correct_count: correct,
            passed,
        }
    }

    #[test]
    fn test_answer_statistics() {
        let questions = vec![
            question(1, AnswerOption::A, true, false),
            question(2, AnswerOption::B, true, true),
            question(3, AnswerOption::C, false, true),
        ];
        let tallies = vec![
            tally(1, AnswerOption::A, 3),
            tally(1, AnswerOption::B, 1),
            tally(2, AnswerOption::A, 2),
            tally(2, AnswerOption::D, 1),
            tally(2, AnswerOption::B, 1),
            // answers to a retired question still count in the total
            tally(9, AnswerOption::A, 5),
        ];

        let stats = answer_statistics(&questions, &tallies);
        assert_eq!(stats.answer_count, 13);

        let order: Vec<i64> = stats.questions.iter().map(|q| q.question_id).collect();
        assert_eq!(order, vec![2, 1, 3]);

        let second = &stats.questions[0];
        assert_eq!(second.usage, "exam & quiz");
        assert_eq!(second.wrong_answers, 3);
        assert_eq!(second.total_answers, 4);
        assert_eq!(second.percentages, Some([50, 25, 0, 25]));

        let first = &stats.questions[1];
        assert_eq!(first.usage, "exam");
        assert_eq!((first.count_a, first.count_b), (3, 1));
        assert_eq!(first.percentages, Some([75, 25, 0, 0]));

        let third = &stats.questions[2];
        assert_eq!(third.usage, "quiz");
        assert_eq!(third.total_answers, 0);
        assert!(third.percentages.is_none());
    }

    #[test]
    fn test_attempt_statistics() {
        let mut open = attempt(5, 4, 5, 0, false);
        open.is_finished = false;
        open.finished_at = None;

        let attempts = vec![
            attempt(1, 1, 1, 16, true),
            attempt(2, 2, 1, 9, false),
            attempt(3, 2, 2, 15, true),
            // finished without a single correct answer is not completed
            attempt(4, 3, 2, 0, false),
            open,
        ];

        let stats = attempt_statistics(&attempts);
        assert_eq!(
            stats,
            AttemptStatistics {
                started: 5,
                unique_candidates: 4,
                completed: 3,
                completed_percentage: 60,
                passed: 2,
                passed_percentage: 67,
                average_correct: Some(13),
            }
        );
    }

    #[test]
    fn test_halves_round_to_even() {
        assert_eq!(percentage(1, 8), 12);
        assert_eq!(percentage(3, 8), 38);
        assert_eq!(percentage(1, 3), 33);

        // 1 completed out of 8 started; correct counts 12 and 13 average to 12.5
        let mut attempts: Vec<Attempt> = (1..=7)
            .map(|id| {
                let mut open = attempt(id, id, 1, 0, false);
                open.is_finished = false;
                open.finished_at = None;
                open
            })
            .collect();
        attempts.push(attempt(8, 8, 2, 12, false));

        let stats = attempt_statistics(&attempts);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.completed_percentage, 12);
        assert_eq!(stats.average_correct, Some(12));

        attempts.push(attempt(9, 9, 3, 13, false));
        assert_eq!(attempt_statistics(&attempts).average_correct, Some(12));
    }

    #[test]
    fn test_attempt_statistics_empty() {
        let stats = attempt_statistics(&[]);
        assert_eq!(stats.started, 0);
        assert_eq!(stats.completed_percentage, 0);
        assert_eq!(stats.passed_percentage, 0);
        assert!(stats.average_correct.is_none());
    }

    #[test]
    fn test_failed_candidates() {
        let attempts = vec![
            attempt(1, 10, 1, 8, false),
            attempt(2, 10, 4, 12, false),
            // failed then passed: not listed
            attempt(3, 11, 2, 5, false),
            attempt(4, 11, 3, 18, true),
            attempt(5, 12, 6, 13, false),
        ];

        let list = failed_candidates(&attempts, DEFAULT_FAILED_LIMIT, Utc.fix());
        assert_eq!(list.len(), 2);

        assert_eq!(list[0].candidate_id, 12);
        assert_eq!(list[1].candidate_id, 10);
        assert_eq!(list[1].total_correct, 20);
        assert_eq!(list[1].total_wrong, 20);
        assert_eq!(list[1].times_failed, 2);
        assert_eq!(list[1].last_attempt, NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());

        assert_eq!(failed_candidates(&attempts, 1, Utc.fix()).len(), 1);
    }
}
