use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::db::prelude::{Challenge, ChallengeStatus, UserChallenge, UserChallengeId, UserId};

pub fn deadline(challenge: &Challenge, joined_at: DateTime<Utc>) -> DateTime<Utc> {
    joined_at + Duration::days(i64::from(challenge.duration_days))
}

/// Builds a fresh `active` enrollment with zeroed progress.
pub fn new_enrollment(
    challenge: &Challenge,
    user_id: &UserId,
    retry_count: i32,
    now: DateTime<Utc>,
) -> UserChallenge {
    UserChallenge {
        id: UserChallengeId(Uuid::new_v4()),
        user_id: user_id.clone(),
        challenge_id: challenge.id,
        status: ChallengeStatus::Active,
        progress_percent: 0,
        checkins_completed: 0,
        checkins_required: challenge.checkins_required(),
        current_streak: 0,
        longest_streak: 0,
        joined_at: now,
        deadline: deadline(challenge, now),
        completed_at: None,
        failed_at: None,
        failure_reason: None,
        partial_completion_percent: None,
        points_earned: 0,
        can_retry: true,
        retry_count,
    }
}
