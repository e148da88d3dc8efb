//! User-facing messages for join, check-in and abandon results.

use crate::db::prelude::{Challenge, ChallengeProgress, ChallengeStatus, ChallengeType, UserChallenge};

pub fn joined(enrollment: &UserChallenge) -> String {
    let days = (enrollment.deadline - enrollment.joined_at).num_days();
    format!("Challenge joined! You have {days} days to complete it.")
}

pub fn checked_in(
    challenge: &Challenge,
    progress: &ChallengeProgress,
    enrollment: &UserChallenge,
) -> String {
    if enrollment.status == ChallengeStatus::Completed {
        return format!(
            "🎉 Challenge complete! You earned {} points!",
            enrollment.points_earned
        );
    }

    if !progress.completed {
        return String::from("📝 Check-in recorded. Keep going tomorrow!");
    }

    match challenge.challenge_type {
        ChallengeType::Streak => format!(
            "✅ Progress logged! {}/{} day streak",
            enrollment.current_streak,
            challenge.checkins_required()
        ),
        ChallengeType::Flexible | ChallengeType::TimeBound => format!(
            "✅ Progress logged! {}/{} complete",
            enrollment.checkins_completed, enrollment.checkins_required
        ),
    }
}

pub fn abandoned(partial_points: i32) -> String {
    if partial_points > 0 {
        format!("Challenge abandoned. You earned {partial_points} points for your progress.")
    } else {
        String::from("Challenge abandoned. No points were earned this time.")
    }
}
