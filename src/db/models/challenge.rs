use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct ChallengeId(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "challenge_type", rename_all = "snake_case")]
pub enum ChallengeType {
    /// Any `required_checkins` completed check-ins within the window
    Flexible,
    /// `required_consecutive_days` completed check-ins without a gap
    Streak,
    TimeBound,
}

/// Catalog entry, immutable per version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Challenge {
    pub id: ChallengeId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub difficulty: String,
    pub challenge_type: ChallengeType,
    pub duration_days: i32,
    pub required_checkins: Option<i32>,
    pub required_consecutive_days: Option<i32>,
    pub points_full: i32,
    pub points_partial_enabled: bool,
    pub grace_period_hours: i32,
    pub max_missed_days: Option<i32>,
    pub failure_condition: Option<String>,
    pub is_active: bool,
    pub total_participants: i32,
    pub created_at: DateTime<Utc>,
}

impl Challenge {
    /// Rejects catalog rows the engine can't score.
    pub fn validate(&self) -> Result<(), String> {
        if self.duration_days <= 0 {
            return Err(format!(
                "challenge {} has non-positive duration_days ({})",
                self.id, self.duration_days
            ));
        }

        if self.points_full < 0 {
            return Err(format!(
                "challenge {} has negative points_full ({})",
                self.id, self.points_full
            ));
        }

        Ok(())
    }

    /// Number of check-ins (or consecutive days, for streaks) that make up 100%.
    pub fn checkins_required(&self) -> i32 {
        let target = match self.challenge_type {
            ChallengeType::Streak => self.required_consecutive_days,
            ChallengeType::Flexible | ChallengeType::TimeBound => self.required_checkins,
        };

        target.unwrap_or(self.duration_days).max(1)
    }
}

/// Optional filters accepted by the catalog listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFilter {
    pub category: Option<String>,
    pub difficulty: Option<String>,
}

impl CatalogFilter {
    pub fn matches(&self, challenge: &Challenge) -> bool {
        let category = self
            .category
            .as_deref()
            .is_none_or(|c| c.eq_ignore_ascii_case(&challenge.category));
        let difficulty = self
            .difficulty
            .as_deref()
            .is_none_or(|d| d.eq_ignore_ascii_case(&challenge.difficulty));

        challenge.is_active && category && difficulty
    }
}

impl From<Uuid> for ChallengeId {
    fn from(value: Uuid) -> Self {
        ChallengeId(value)
    }
}

impl FromStr for ChallengeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ChallengeId(Uuid::parse_str(s)?))
    }
}

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChallengeType::Flexible => "flexible",
            ChallengeType::Streak => "streak",
            ChallengeType::TimeBound => "time_bound",
        };
        f.write_str(s)
    }
}
