//! Derived enrollment state, recomputed from the full check-in log after every insert.

use chrono::{DateTime, NaiveDate, Utc};

use crate::db::prelude::{
    Challenge, ChallengeProgress, ChallengeStatus, ChallengeType, UserChallenge,
};

/// Aggregate values derived from a check-in log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregate {
    pub checkins_completed: i32,
    pub current_streak: i32,
    pub longest_streak: i32,
}

/// Counts completed check-ins and measures streaks over `rows`, in any order.
pub fn aggregate(rows: &[ChallengeProgress]) -> Aggregate {
    let mut days: Vec<(NaiveDate, bool)> = rows
        .iter()
        .filter(|p| p.progress_type.is_checkin())
        .map(|p| (p.checkin_date, p.completed))
        .collect();
    days.sort_by_key(|(date, _)| *date);

    let checkins_completed = days.iter().filter(|(_, completed)| *completed).count() as i32;

    Aggregate {
        checkins_completed,
        current_streak: current_streak(&days),
        longest_streak: longest_streak(&days),
    }
}

/// Trailing run of consecutive completed days, walked backwards from the latest check-in.
///
/// The walk stops at the first gap of more than one day or at a `completed = false` entry, so
/// a missed day logged last resets the streak to 0.
fn current_streak(days: &[(NaiveDate, bool)]) -> i32 {
    let mut streak = 0;
    let mut previous: Option<NaiveDate> = None;

    for (date, completed) in days.iter().rev() {
        if !completed {
            break;
        }

        if let Some(prev) = previous {
            if (prev - *date).num_days() > 1 {
                break;
            }
        }

        streak += 1;
        previous = Some(*date);
    }

    streak
}

fn longest_streak(days: &[(NaiveDate, bool)]) -> i32 {
    let mut best = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;

    for (date, completed) in days {
        if !completed {
            run = 0;
            previous = None;
            continue;
        }

        run = match previous {
            Some(prev) if (*date - prev).num_days() == 1 => run + 1,
            _ => 1,
        };

        best = best.max(run);
        previous = Some(*date);
    }

    best
}

/// `(achieved, target)` behind an enrollment's percentage.
///
/// Streak challenges score the best streak reached, so a broken streak never takes back
/// progress already shown to the user.
pub fn progress_ratio(challenge: &Challenge, enrollment: &UserChallenge) -> (i32, i32) {
    let target = match challenge.challenge_type {
        ChallengeType::Streak => challenge.required_consecutive_days,
        ChallengeType::Flexible | ChallengeType::TimeBound => challenge.required_checkins,
    }
    .unwrap_or(enrollment.checkins_required)
    .max(1);

    let achieved = match challenge.challenge_type {
        ChallengeType::Streak => enrollment.longest_streak,
        ChallengeType::Flexible | ChallengeType::TimeBound => enrollment.checkins_completed,
    };

    (achieved.clamp(0, target), target)
}

pub fn progress_percent(achieved: i32, target: i32) -> i32 {
    if target <= 0 {
        return 0;
    }

    ((i64::from(achieved) * 100) / i64::from(target)).clamp(0, 100) as i32
}

/// Applies a recomputed log to `enrollment`, including the completion transition.
///
/// Terminal enrollments are returned unchanged.
pub fn apply(
    challenge: &Challenge,
    enrollment: &UserChallenge,
    rows: &[ChallengeProgress],
    now: DateTime<Utc>,
) -> UserChallenge {
    let mut updated = enrollment.clone();
    if updated.status.is_terminal() {
        return updated;
    }

    let agg = aggregate(rows);
    updated.checkins_completed = agg.checkins_completed;
    updated.current_streak = agg.current_streak;
    updated.longest_streak = agg.longest_streak.max(enrollment.longest_streak);

    let (achieved, target) = progress_ratio(challenge, &updated);
    updated.progress_percent = progress_percent(achieved, target).max(enrollment.progress_percent);

    if updated.progress_percent >= 100 {
        updated.status = ChallengeStatus::Completed;
        updated.completed_at = Some(now);
        updated.points_earned = challenge.points_full;
        updated.partial_completion_percent = None;
    }

    updated
}
