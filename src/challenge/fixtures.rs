use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use crate::db::prelude::{
    Challenge, ChallengeId, ChallengeProgress, ChallengeType, CheckinRequest, UserChallengeId,
};

/// 2025-03-01 09:00 UTC
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

pub fn day(offset: i64) -> NaiveDate {
    epoch().date_naive() + Duration::days(offset)
}

fn base_challenge(challenge_type: ChallengeType, points_full: i32) -> Challenge {
    Challenge {
        id: ChallengeId(Uuid::new_v4()),
        title: String::from("No-spend week"),
        description: String::from("Skip non-essential purchases"),
        category: String::from("spending"),
        difficulty: String::from("easy"),
        challenge_type,
        duration_days: 7,
        required_checkins: None,
        required_consecutive_days: None,
        points_full,
        points_partial_enabled: true,
        grace_period_hours: 0,
        max_missed_days: None,
        failure_condition: None,
        is_active: true,
        total_participants: 0,
        created_at: epoch(),
    }
}

pub fn flexible_challenge(required_checkins: i32, points_full: i32) -> Challenge {
    Challenge {
        required_checkins: Some(required_checkins),
        duration_days: required_checkins.max(7),
        ..base_challenge(ChallengeType::Flexible, points_full)
    }
}

pub fn streak_challenge(required_days: i32, points_full: i32) -> Challenge {
    Challenge {
        required_consecutive_days: Some(required_days),
        duration_days: 14,
        ..base_challenge(ChallengeType::Streak, points_full)
    }
}

/// A check-in `offset` days after [`epoch`].
pub fn checkin(id: UserChallengeId, offset: i64, completed: bool) -> ChallengeProgress {
    let date = day(offset);
    ChallengeProgress::new_checkin(
        id,
        CheckinRequest {
            completed: Some(completed),
            ..Default::default()
        },
        date,
        date,
        epoch() + Duration::days(offset),
    )
}
