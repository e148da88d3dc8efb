use core::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;
use tracing::instrument;

use crate::db::prelude::{
    CatalogFilter, Challenge, ChallengeId, ChallengeProgress, ChallengeStatus, FailureReason,
    UserChallenge, UserChallengeId, UserId,
};

pub mod memory;
pub mod postgres;

pub type StoreResult<T> = core::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    SqlxError(sqlx::Error),

    /// A uniqueness constraint rejected the write; carries the constraint name
    #[error("unique constraint '{0}' violated")]
    UniqueViolation(String),

    /// The enrollment left `active` before the write could be applied
    #[error("enrollment is no longer active (status: {0})")]
    NotActive(ChallengeStatus),

    #[error("enrollment {0} does not exist")]
    MissingEnrollment(UserChallengeId),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                return StoreError::UniqueViolation(constraint);
            }
        }

        StoreError::SqlxError(err)
    }
}

pub mod constraint {
    pub const ONE_ACTIVE_ENROLLMENT: &str = "user_challenges_one_active";
    pub const ONE_CHECKIN_PER_DAY: &str = "challenge_progress_one_per_day";
}

/// Persistence seam for the challenge engine.
///
/// Both uniqueness invariants (one active enrollment per user and challenge, one check-in per
/// enrollment and date) are the store's responsibility and surface as
/// [`StoreError::UniqueViolation`].
#[async_trait]
pub trait ChallengeStore: Send + Sync + fmt::Debug {
    async fn list_challenges(
        &self,
        filter: &CatalogFilter,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<Challenge>, i64)>;

    async fn get_challenge(&self, id: &ChallengeId) -> StoreResult<Option<Challenge>>;

    /// Advisory participant counter, bumped on every join.
    async fn increment_participants(&self, id: &ChallengeId) -> StoreResult<()>;

    async fn find_active_enrollment(
        &self,
        user_id: &UserId,
        challenge_id: &ChallengeId,
    ) -> StoreResult<Option<UserChallenge>>;

    /// Number of earlier enrollments of the same challenge that ended without completing.
    async fn count_unsuccessful_attempts(
        &self,
        user_id: &UserId,
        challenge_id: &ChallengeId,
    ) -> StoreResult<i64>;

    async fn insert_enrollment(&self, item: &UserChallenge) -> StoreResult<()>;

    async fn get_enrollment(&self, id: &UserChallengeId) -> StoreResult<Option<UserChallenge>>;

    async fn list_enrollments(
        &self,
        user_id: &UserId,
        status: Option<ChallengeStatus>,
    ) -> StoreResult<Vec<UserChallenge>>;

    async fn list_active_enrollments(&self) -> StoreResult<Vec<UserChallenge>>;

    /// Check-in rows of an enrollment ordered by `checkin_date`.
    async fn list_progress(&self, id: &UserChallengeId) -> StoreResult<Vec<ChallengeProgress>>;

    /// Appends a check-in and persists the re-aggregated enrollment atomically, returning the
    /// updated enrollment.
    async fn append_checkin(
        &self,
        challenge: &Challenge,
        progress: &ChallengeProgress,
        now: DateTime<Utc>,
    ) -> StoreResult<UserChallenge>;

    /// Settles an enrollment for `reason`, computing partial credit from the stored row while it
    /// is locked, provided that row is still `active`. Returns the settled enrollment.
    async fn settle_enrollment(
        &self,
        challenge: &Challenge,
        id: &UserChallengeId,
        reason: FailureReason,
        now: DateTime<Utc>,
    ) -> StoreResult<UserChallenge>;
}

pub struct Tx {
    inner: Option<Transaction<'static, Postgres>>,
}

impl Tx {
    /// Runs `f` inside a transaction, committing only when it returns `Ok`.
    ///
    /// The closure hands the transaction back alongside its result; dropping an uncommitted
    /// transaction rolls it back.
    #[instrument(skip(pool, f))]
    pub async fn with_tx<F, Fut, T>(pool: &PgPool, f: F) -> StoreResult<T>
    where
        F: FnOnce(Tx) -> Fut,
        Fut: Future<Output = (Tx, StoreResult<T>)>,
    {
        let tx = Self::begin(pool).await?;
        let (mut tx, result) = f(tx).await;

        match result {
            Ok(val) => {
                tx.commit().await?;
                Ok(val)
            }
            Err(e) => {
                tracing::trace!(error = ?e, "transacted query failure");
                Err(e)
            }
        }
    }

    #[instrument(skip(pool))]
    pub async fn begin(pool: &PgPool) -> StoreResult<Self> {
        let inner = pool.begin().await?;
        Ok(Self { inner: Some(inner) })
    }

    #[instrument(skip(self))]
    pub async fn commit(&mut self) -> StoreResult<()> {
        match self.inner.take() {
            Some(tx) => Ok(tx.commit().await?),
            None => Err(already_completed().into()),
        }
    }

    pub(crate) fn inner_mut(&mut self) -> StoreResult<&mut Transaction<'static, Postgres>> {
        self.inner
            .as_mut()
            .ok_or_else(|| already_completed().into())
    }
}

fn already_completed() -> sqlx::Error {
    sqlx::Error::Protocol("Transaction already completed".into())
}

pub mod sql_fragment {
    pub const CHALLENGE_FIELDS: &str = r#"
        id,
        title,
        description,
        category,
        difficulty,
        challenge_type,
        duration_days,
        required_checkins,
        required_consecutive_days,
        points_full,
        points_partial_enabled,
        grace_period_hours,
        max_missed_days,
        failure_condition,
        is_active,
        total_participants,
        created_at
    "#;

    pub const USER_CHALLENGE_FIELDS: &str = r#"
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
        completed_at,
        failed_at,
        failure_reason,
        partial_completion_percent,
        points_earned,
        can_retry,
        retry_count
    "#;

    pub const PROGRESS_FIELDS: &str = r#"
        id,
        user_challenge_id,
        progress_type,
        checkin_date,
        completed,
        note,
        value,
        created_at
    "#;
}
