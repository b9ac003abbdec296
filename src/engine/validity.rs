// src/engine/validity.rs

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};

use crate::models::attempt::{Attempt, Qualification};

/// One calendar year after `finished`. A pass on Feb 29 expires on Mar 1 of the next year.
pub fn expiry_date(finished: NaiveDate) -> Option<NaiveDate> {
    let year = finished.year() + 1;
    NaiveDate::from_ymd_opt(year, finished.month(), finished.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, 3, 1))
}

/// The calendar date of `at` on the quiz's clock.
pub fn local_date(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

/// Whether a graded attempt still qualifies the candidate at `now`.
///
/// Both the finish date and today are taken at `offset`, so the day boundary
/// falls on local midnight.
pub fn qualification(
    attempt: &Attempt,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Qualification {
    if !(attempt.is_finished && attempt.passed) {
        return Qualification::none();
    }

    let Some(expires_on) = attempt
        .finished_at
        .and_then(|finished_at| expiry_date(local_date(finished_at, offset)))
    else {
        return Qualification::none();
    };

    let today = local_date(now, offset);
    let valid = expires_on > today;
    Qualification {
        valid,
        days_remaining: if valid {
            (expires_on - today).num_days()
        } else {
            0
        },
        expires_on: Some(expires_on),
    }
}
