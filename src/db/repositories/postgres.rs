use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use super::{ChallengeStore, StoreError, StoreResult, Tx, sql_fragment};
use crate::challenge::{aggregate, settlement};
use crate::db::prelude::{
    CatalogFilter, Challenge, ChallengeId, ChallengeProgress, ChallengeStatus, FailureReason,
    UserChallenge, UserChallengeId, UserId,
};

#[derive(Debug, Clone)]
pub struct PgChallengeStore {
    pool: PgPool,
}

impl PgChallengeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChallengeStore for PgChallengeStore {
    #[instrument(skip(self))]
    async fn list_challenges(
        &self,
        filter: &CatalogFilter,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<Challenge>, i64)> {
        let items = sqlx::query_as::<_, Challenge>(&format!(
            r#"
            SELECT {} FROM challenges
            WHERE is_active
            AND ($1::TEXT IS NULL OR LOWER(category) = LOWER($1))
            AND ($2::TEXT IS NULL OR LOWER(difficulty) = LOWER($2))
            ORDER BY created_at ASC, id ASC
            LIMIT $3 OFFSET $4
            "#,
            sql_fragment::CHALLENGE_FIELDS
        ))
        .bind(filter.category.as_deref())
        .bind(filter.difficulty.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM challenges
            WHERE is_active
            AND ($1::TEXT IS NULL OR LOWER(category) = LOWER($1))
            AND ($2::TEXT IS NULL OR LOWER(difficulty) = LOWER($2))
            "#,
        )
        .bind(filter.category.as_deref())
        .bind(filter.difficulty.as_deref())
        .fetch_one(&self.pool)
        .await?;

        Ok((items, total))
    }

    #[instrument(skip(self))]
    async fn get_challenge(&self, id: &ChallengeId) -> StoreResult<Option<Challenge>> {
        Ok(sqlx::query_as::<_, Challenge>(&format!(
            "SELECT {} FROM challenges WHERE id = $1",
            sql_fragment::CHALLENGE_FIELDS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    #[instrument(skip(self))]
    async fn increment_participants(&self, id: &ChallengeId) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE challenges
            SET total_participants = total_participants + 1
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_active_enrollment(
        &self,
        user_id: &UserId,
        challenge_id: &ChallengeId,
    ) -> StoreResult<Option<UserChallenge>> {
        Ok(sqlx::query_as::<_, UserChallenge>(&format!(
            r#"
            SELECT {} FROM user_challenges
            WHERE user_id = $1
            AND challenge_id = $2
            AND status = 'active'
            "#,
            sql_fragment::USER_CHALLENGE_FIELDS
        ))
        .bind(user_id)
        .bind(challenge_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    #[instrument(skip(self))]
    async fn count_unsuccessful_attempts(
        &self,
        user_id: &UserId,
        challenge_id: &ChallengeId,
    ) -> StoreResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM user_challenges
            WHERE user_id = $1
            AND challenge_id = $2
            AND status IN ('failed', 'abandoned')
            "#,
        )
        .bind(user_id)
        .bind(challenge_id)
        .fetch_one(&self.pool)
        .await?)
    }

    #[instrument(skip(self, item), fields(user_challenge = %item.id, user = %item.user_id))]
    async fn insert_enrollment(&self, item: &UserChallenge) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_challenges (
                id,
                user_id,
                challenge_id,
                status,
                progress_percent,
                checkins_completed,
                checkins_required,
                current_streak,
                longest_streak,
                joined_at,
                deadline,
                points_earned,
                can_retry,
                retry_count
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(item.id)
        .bind(&item.user_id)
        .bind(item.challenge_id)
        .bind(item.status)
        .bind(item.progress_percent)
        .bind(item.checkins_completed)
        .bind(item.checkins_required)
        .bind(item.current_streak)
        .bind(item.longest_streak)
        .bind(item.joined_at)
        .bind(item.deadline)
        .bind(item.points_earned)
        .bind(item.can_retry)
        .bind(item.retry_count)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let err = StoreError::from(e);
                if !matches!(err, StoreError::UniqueViolation(_)) {
                    tracing::error!(error = ?err, "failure during enrollment insertion");
                }
                Err(err)
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_enrollment(&self, id: &UserChallengeId) -> StoreResult<Option<UserChallenge>> {
        Ok(sqlx::query_as::<_, UserChallenge>(&format!(
            "SELECT {} FROM user_challenges WHERE id = $1",
            sql_fragment::USER_CHALLENGE_FIELDS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    #[instrument(skip(self))]
    async fn list_enrollments(
        &self,
        user_id: &UserId,
        status: Option<ChallengeStatus>,
    ) -> StoreResult<Vec<UserChallenge>> {
        Ok(sqlx::query_as::<_, UserChallenge>(&format!(
            r#"
            SELECT {} FROM user_challenges
            WHERE user_id = $1
            AND ($2::challenge_status IS NULL OR status = $2)
            ORDER BY joined_at DESC
            "#,
            sql_fragment::USER_CHALLENGE_FIELDS
        ))
        .bind(user_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?)
    }

    #[instrument(skip(self))]
    async fn list_active_enrollments(&self) -> StoreResult<Vec<UserChallenge>> {
        Ok(sqlx::query_as::<_, UserChallenge>(&format!(
            "SELECT {} FROM user_challenges WHERE status = 'active' ORDER BY deadline ASC",
            sql_fragment::USER_CHALLENGE_FIELDS
        ))
        .fetch_all(&self.pool)
        .await?)
    }

    #[instrument(skip(self))]
    async fn list_progress(&self, id: &UserChallengeId) -> StoreResult<Vec<ChallengeProgress>> {
        Ok(sqlx::query_as::<_, ChallengeProgress>(&format!(
            r#"
            SELECT {} FROM challenge_progress
            WHERE user_challenge_id = $1
            ORDER BY checkin_date ASC
            "#,
            sql_fragment::PROGRESS_FIELDS
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?)
    }

    #[instrument(skip(self, challenge, progress), fields(user_challenge = %progress.user_challenge_id, date = %progress.checkin_date))]
    async fn append_checkin(
        &self,
        challenge: &Challenge,
        progress: &ChallengeProgress,
        now: DateTime<Utc>,
    ) -> StoreResult<UserChallenge> {
        Tx::with_tx(&self.pool, |mut tx| async move {
            let result = async {
                let current = tx.lock_enrollment(&progress.user_challenge_id).await?;
                if !current.is_active() {
                    return Err(StoreError::NotActive(current.status));
                }

                tx.insert_progress(progress).await?;
                let history = tx.progress_for(&progress.user_challenge_id).await?;

                let updated = aggregate::apply(challenge, &current, &history, now);
                tx.write_enrollment(&updated).await?;

                Ok(updated)
            }
            .await;

            (tx, result)
        })
        .await
    }

    #[instrument(skip(self, challenge), fields(%reason))]
    async fn settle_enrollment(
        &self,
        challenge: &Challenge,
        id: &UserChallengeId,
        reason: FailureReason,
        now: DateTime<Utc>,
    ) -> StoreResult<UserChallenge> {
        Tx::with_tx(&self.pool, |mut tx| async move {
            let result = async {
                let current = tx.lock_enrollment(id).await?;
                if !current.is_active() {
                    return Err(StoreError::NotActive(current.status));
                }

                let settled = settlement::settle(challenge, &current, reason, now);
                tx.write_enrollment(&settled).await?;

                Ok(settled)
            }
            .await;

            (tx, result)
        })
        .await
    }
}

impl Tx {
    /// Loads an enrollment with a row lock held until the transaction ends.
    #[instrument(skip(self))]
    pub async fn lock_enrollment(&mut self, id: &UserChallengeId) -> StoreResult<UserChallenge> {
        sqlx::query_as::<_, UserChallenge>(&format!(
            "SELECT {} FROM user_challenges WHERE id = $1 FOR UPDATE",
            sql_fragment::USER_CHALLENGE_FIELDS
        ))
        .bind(id)
        .fetch_optional(&mut **self.inner_mut()?)
        .await?
        .ok_or(StoreError::MissingEnrollment(*id))
    }

    #[instrument(skip(self, item))]
    pub async fn insert_progress(&mut self, item: &ChallengeProgress) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO challenge_progress (
                id,
                user_challenge_id,
                progress_type,
                checkin_date,
                completed,
                note,
                value,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(item.id)
        .bind(item.user_challenge_id)
        .bind(item.progress_type)
        .bind(item.checkin_date)
        .bind(item.completed)
        .bind(item.note.as_deref())
        .bind(item.value)
        .bind(item.created_at)
        .execute(&mut **self.inner_mut()?)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn progress_for(&mut self, id: &UserChallengeId) -> StoreResult<Vec<ChallengeProgress>> {
        Ok(sqlx::query_as::<_, ChallengeProgress>(&format!(
            r#"
            SELECT {} FROM challenge_progress
            WHERE user_challenge_id = $1
            ORDER BY checkin_date ASC
            "#,
            sql_fragment::PROGRESS_FIELDS
        ))
        .bind(id)
        .fetch_all(&mut **self.inner_mut()?)
        .await?)
    }

    /// Overwrites every mutable column of an enrollment.
    #[instrument(skip(self, item), fields(user_challenge = %item.id))]
    pub async fn write_enrollment(&mut self, item: &UserChallenge) -> StoreResult<()> {
        let res = sqlx::query(
            r#"
            UPDATE user_challenges
            SET status = $2,
                progress_percent = $3,
                checkins_completed = $4,
                current_streak = $5,
                longest_streak = $6,
                completed_at = $7,
                failed_at = $8,
                failure_reason = $9,
                partial_completion_percent = $10,
                points_earned = $11,
                can_retry = $12
            WHERE id = $1
            "#,
        )
        .bind(item.id)
        .bind(item.status)
        .bind(item.progress_percent)
        .bind(item.checkins_completed)
        .bind(item.current_streak)
        .bind(item.longest_streak)
        .bind(item.completed_at)
        .bind(item.failed_at)
        .bind(item.failure_reason.as_deref())
        .bind(item.partial_completion_percent)
        .bind(item.points_earned)
        .bind(item.can_retry)
        .execute(&mut **self.inner_mut()?)
        .await?;

        tracing::debug!(rows = res.rows_affected(), "wrote enrollment");

        Ok(())
    }
}
