use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{ChallengeStore, StoreError, StoreResult, constraint};
use crate::challenge::{aggregate, settlement};
use crate::db::prelude::{
    CatalogFilter, Challenge, ChallengeId, ChallengeProgress, ChallengeStatus, FailureReason,
    UserChallenge, UserChallengeId, UserId,
};

/// Process-local store with the same uniqueness semantics as the Postgres schema.
///
/// Backs the router and service tests; every call takes the single table lock, so
/// `append_checkin` and `settle_enrollment` are atomic just as they are under a row lock.
#[derive(Debug, Default)]
pub struct MemoryChallengeStore {
    tables: RwLock<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    challenges: Vec<Challenge>,
    enrollments: HashMap<UserChallengeId, UserChallenge>,
    progress: Vec<ChallengeProgress>,
}

impl MemoryChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_challenges(challenges: impl IntoIterator<Item = Challenge>) -> Self {
        Self {
            tables: RwLock::new(Tables {
                challenges: challenges.into_iter().collect(),
                ..Default::default()
            }),
        }
    }

    pub async fn insert_challenge(&self, challenge: Challenge) {
        self.tables.write().await.challenges.push(challenge);
    }
}

impl Tables {
    fn progress_for(&self, id: &UserChallengeId) -> Vec<ChallengeProgress> {
        let mut rows: Vec<ChallengeProgress> = self
            .progress
            .iter()
            .filter(|p| &p.user_challenge_id == id)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.checkin_date);
        rows
    }

    fn active_enrollment(&self, id: &UserChallengeId) -> StoreResult<&UserChallenge> {
        let current = self
            .enrollments
            .get(id)
            .ok_or(StoreError::MissingEnrollment(*id))?;

        if current.is_active() {
            Ok(current)
        } else {
            Err(StoreError::NotActive(current.status))
        }
    }
}

#[async_trait]
impl ChallengeStore for MemoryChallengeStore {
    async fn list_challenges(
        &self,
        filter: &CatalogFilter,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<Challenge>, i64)> {
        let tables = self.tables.read().await;
        let mut matching: Vec<&Challenge> =
            tables.challenges.iter().filter(|c| filter.matches(c)).collect();
        matching.sort_by_key(|c| (c.created_at, c.id.0));

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();

        Ok((items, total))
    }

    async fn get_challenge(&self, id: &ChallengeId) -> StoreResult<Option<Challenge>> {
        let tables = self.tables.read().await;
        Ok(tables.challenges.iter().find(|c| &c.id == id).cloned())
    }

    async fn increment_participants(&self, id: &ChallengeId) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(c) = tables.challenges.iter_mut().find(|c| &c.id == id) {
            c.total_participants += 1;
        }
        Ok(())
    }

    async fn find_active_enrollment(
        &self,
        user_id: &UserId,
        challenge_id: &ChallengeId,
    ) -> StoreResult<Option<UserChallenge>> {
        let tables = self.tables.read().await;
        Ok(tables
            .enrollments
            .values()
            .find(|e| &e.user_id == user_id && &e.challenge_id == challenge_id && e.is_active())
            .cloned())
    }

    async fn count_unsuccessful_attempts(
        &self,
        user_id: &UserId,
        challenge_id: &ChallengeId,
    ) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .enrollments
            .values()
            .filter(|e| {
                &e.user_id == user_id
                    && &e.challenge_id == challenge_id
                    && matches!(e.status, ChallengeStatus::Failed | ChallengeStatus::Abandoned)
            })
            .count() as i64)
    }

    async fn insert_enrollment(&self, item: &UserChallenge) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let duplicate_active = item.is_active()
            && tables.enrollments.values().any(|e| {
                e.user_id == item.user_id && e.challenge_id == item.challenge_id && e.is_active()
            });

        if duplicate_active {
            return Err(StoreError::UniqueViolation(
                constraint::ONE_ACTIVE_ENROLLMENT.to_string(),
            ));
        }

        tables.enrollments.insert(item.id, item.clone());
        Ok(())
    }

    async fn get_enrollment(&self, id: &UserChallengeId) -> StoreResult<Option<UserChallenge>> {
        Ok(self.tables.read().await.enrollments.get(id).cloned())
    }

    async fn list_enrollments(
        &self,
        user_id: &UserId,
        status: Option<ChallengeStatus>,
    ) -> StoreResult<Vec<UserChallenge>> {
        let tables = self.tables.read().await;
        let mut items: Vec<UserChallenge> = tables
            .enrollments
            .values()
            .filter(|e| &e.user_id == user_id && status.is_none_or(|s| e.status == s))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.joined_at.cmp(&a.joined_at));

        Ok(items)
    }

    async fn list_active_enrollments(&self) -> StoreResult<Vec<UserChallenge>> {
        let tables = self.tables.read().await;
        let mut items: Vec<UserChallenge> = tables
            .enrollments
            .values()
            .filter(|e| e.is_active())
            .cloned()
            .collect();
        items.sort_by_key(|e| e.deadline);

        Ok(items)
    }

    async fn list_progress(&self, id: &UserChallengeId) -> StoreResult<Vec<ChallengeProgress>> {
        Ok(self.tables.read().await.progress_for(id))
    }

    async fn append_checkin(
        &self,
        challenge: &Challenge,
        progress: &ChallengeProgress,
        now: DateTime<Utc>,
    ) -> StoreResult<UserChallenge> {
        let mut tables = self.tables.write().await;
        let current = tables
            .active_enrollment(&progress.user_challenge_id)?
            .clone();

        let duplicate_date = tables.progress.iter().any(|p| {
            p.user_challenge_id == progress.user_challenge_id
                && p.checkin_date == progress.checkin_date
        });

        if duplicate_date {
            return Err(StoreError::UniqueViolation(
                constraint::ONE_CHECKIN_PER_DAY.to_string(),
            ));
        }

        tables.progress.push(progress.clone());
        let history = tables.progress_for(&current.id);

        let updated = aggregate::apply(challenge, &current, &history, now);
        tables.enrollments.insert(updated.id, updated.clone());

        Ok(updated)
    }

    async fn settle_enrollment(
        &self,
        challenge: &Challenge,
        id: &UserChallengeId,
        reason: FailureReason,
        now: DateTime<Utc>,
    ) -> StoreResult<UserChallenge> {
        let mut tables = self.tables.write().await;
        let current = tables.active_enrollment(id)?;

        let settled = settlement::settle(challenge, current, reason, now);
        tables.enrollments.insert(settled.id, settled.clone());

        Ok(settled)
    }
}
