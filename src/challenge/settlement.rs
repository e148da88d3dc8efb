//! Partial credit for enrollments that end without completing.

use chrono::{DateTime, Utc};

use super::aggregate;
use crate::db::prelude::{Challenge, ChallengeStatus, FailureReason, UserChallenge};

/// Points owed for the progress made so far: `floor(points_full × achieved / target)`.
///
/// The exact check-in ratio is used rather than the floored `progress_percent`, so three of
/// seven check-ins on a 70 point challenge settle at 30 rather than 29.
pub fn partial_points(challenge: &Challenge, enrollment: &UserChallenge) -> i32 {
    if !challenge.points_partial_enabled || enrollment.progress_percent <= 0 {
        return 0;
    }

    let (achieved, target) = aggregate::progress_ratio(challenge, enrollment);
    let ratio_points = i64::from(challenge.points_full) * i64::from(achieved) / i64::from(target);

    // never below what the stored percentage implies
    let percent_points =
        i64::from(challenge.points_full) * i64::from(enrollment.progress_percent.min(100)) / 100;

    ratio_points.max(percent_points).clamp(0, i64::from(challenge.points_full)) as i32
}

/// Moves an active enrollment to `abandoned` or `failed` and pays out partial credit.
pub fn settle(
    challenge: &Challenge,
    enrollment: &UserChallenge,
    reason: FailureReason,
    now: DateTime<Utc>,
) -> UserChallenge {
    let mut settled = enrollment.clone();
    settled.status = match reason {
        FailureReason::ManualAbandonment => ChallengeStatus::Abandoned,
        FailureReason::DeadlineExpired | FailureReason::MissedDaysExceeded => {
            ChallengeStatus::Failed
        }
    };

    settled.failed_at = Some(now);
    settled.failure_reason = Some(reason.as_str().to_string());
    settled.partial_completion_percent = Some(enrollment.progress_percent);
    settled.points_earned = partial_points(challenge, enrollment);
    settled.can_retry = true;

    settled
}
