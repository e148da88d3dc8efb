use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user_challenge::UserChallengeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct ProgressId(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "progress_type", rename_all = "snake_case")]
pub enum ProgressType {
    DailyCheckin,
    RetroactiveCheckin,
    Milestone,
    Completion,
    Failure,
}

impl ProgressType {
    /// Only user check-ins count towards progress; the rest are bookkeeping rows.
    pub fn is_checkin(self) -> bool {
        matches!(
            self,
            ProgressType::DailyCheckin | ProgressType::RetroactiveCheckin
        )
    }
}

/// Append-only check-in log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChallengeProgress {
    pub id: ProgressId,
    pub user_challenge_id: UserChallengeId,
    pub progress_type: ProgressType,
    pub checkin_date: NaiveDate,
    pub completed: bool,
    pub note: Option<String>,
    pub value: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /challenges/{id}/progress`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckinRequest {
    pub completed: Option<bool>,
    pub note: Option<String>,
    pub checkin_date: Option<NaiveDate>,
    pub value: Option<f64>,
}

impl ChallengeProgress {
    pub fn new_checkin(
        user_challenge_id: UserChallengeId,
        req: CheckinRequest,
        checkin_date: NaiveDate,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Self {
        let progress_type = if checkin_date == today {
            ProgressType::DailyCheckin
        } else {
            ProgressType::RetroactiveCheckin
        };

        Self {
            id: ProgressId(Uuid::new_v4()),
            user_challenge_id,
            progress_type,
            checkin_date,
            completed: req.completed.unwrap_or(true),
            note: req.note.filter(|n| !n.trim().is_empty()),
            value: req.value,
            created_at: now,
        }
    }
}
