use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::db::prelude::{Challenge, ChallengeProgress, FailureReason, UserChallenge};

/// Instant after which an active enrollment can no longer be completed.
pub fn expires_at(challenge: &Challenge, enrollment: &UserChallenge) -> DateTime<Utc> {
    enrollment.deadline + Duration::hours(i64::from(challenge.grace_period_hours.max(0)))
}

pub fn is_past_deadline(
    challenge: &Challenge,
    enrollment: &UserChallenge,
    now: DateTime<Utc>,
) -> bool {
    now > expires_at(challenge, enrollment)
}

/// Calendar days between joining and yesterday (capped at the deadline) with no completed
/// check-in.
pub fn missed_days(enrollment: &UserChallenge, rows: &[ChallengeProgress], today: NaiveDate) -> i64 {
    let start = enrollment.joined_at.date_naive();
    let Some(yesterday) = today.pred_opt() else {
        return 0;
    };
    let end = yesterday.min(enrollment.deadline.date_naive());

    if end < start {
        return 0;
    }

    let covered: HashSet<NaiveDate> = rows
        .iter()
        .filter(|p| p.progress_type.is_checkin() && p.completed)
        .map(|p| p.checkin_date)
        .filter(|d| *d >= start && *d <= end)
        .collect();

    (end - start).num_days() + 1 - covered.len() as i64
}

/// Decides whether the sweeper should fail an enrollment, and why.
///
/// `rows` is only consulted when the challenge limits missed days.
pub fn failure_reason(
    challenge: &Challenge,
    enrollment: &UserChallenge,
    rows: &[ChallengeProgress],
    now: DateTime<Utc>,
) -> Option<FailureReason> {
    if !enrollment.is_active() || enrollment.progress_percent >= 100 {
        return None;
    }

    if is_past_deadline(challenge, enrollment, now) {
        return Some(FailureReason::DeadlineExpired);
    }

    match challenge.max_missed_days {
        Some(max) if missed_days(enrollment, rows, now.date_naive()) > i64::from(max) => {
            Some(FailureReason::MissedDaysExceeded)
        }
        _ => None,
    }
}
