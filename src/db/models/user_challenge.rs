use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::challenge::ChallengeId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct UserId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct UserChallengeId(pub Uuid);

/// Enrollment lifecycle. `Active` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "challenge_status", rename_all = "snake_case")]
pub enum ChallengeStatus {
    Active,
    Completed,
    Failed,
    Abandoned,
}

impl ChallengeStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ChallengeStatus::Active)
    }
}

/// One enrollment of a user in a catalog challenge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserChallenge {
    pub id: UserChallengeId,
    pub user_id: UserId,
    pub challenge_id: ChallengeId,
    pub status: ChallengeStatus,
    pub progress_percent: i32,
    pub checkins_completed: i32,
    pub checkins_required: i32,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub joined_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub partial_completion_percent: Option<i32>,
    pub points_earned: i32,
    pub can_retry: bool,
    pub retry_count: i32,
}

impl UserChallenge {
    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }

    pub fn is_active(&self) -> bool {
        self.status == ChallengeStatus::Active
    }
}

/// Reason recorded in `failure_reason` when an enrollment leaves `active` without completing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    ManualAbandonment,
    DeadlineExpired,
    MissedDaysExceeded,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::ManualAbandonment => "manual_abandonment",
            FailureReason::DeadlineExpired => "deadline_expired",
            FailureReason::MissedDaysExceeded => "missed_days_exceeded",
        }
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        UserId(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        UserId(value)
    }
}

impl FromStr for UserChallengeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(UserChallengeId(Uuid::parse_str(s)?))
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChallengeStatus::Active => "active",
            ChallengeStatus::Completed => "completed",
            ChallengeStatus::Failed => "failed",
            ChallengeStatus::Abandoned => "abandoned",
        };
        f.write_str(s)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
