use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

use super::{ChallengeError, ChallengeResult, emitter, enrollment, expiry};
use crate::db::prelude::*;
use crate::util::clock::Clock;

#[derive(Debug, Clone, Serialize)]
pub struct JoinOutcome {
    pub user_challenge: UserChallenge,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckinOutcome {
    pub progress: ChallengeProgress,
    pub challenge: UserChallenge,
    pub is_complete: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AbandonOutcome {
    pub partial_points: i32,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsSummary {
    pub total_points: i64,
    pub active: i64,
    pub completed: i64,
    pub abandoned: i64,
    pub failed: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub failed: usize,
}

/// Challenge lifecycle operations over a [`ChallengeStore`].
#[derive(Debug, Clone)]
pub struct ChallengeService {
    store: Arc<dyn ChallengeStore>,
    clock: Arc<dyn Clock>,
}

impl ChallengeService {
    pub fn new(store: Arc<dyn ChallengeStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    #[instrument(skip(self))]
    pub async fn list_catalog(
        &self,
        filter: &CatalogFilter,
        pagination: &Pagination,
    ) -> ChallengeResult<PaginatedResponse<Challenge>> {
        let (limit, offset) = pagination.window();
        let (items, total) = self.store.list_challenges(filter, limit, offset).await?;

        Ok(PaginatedResponse::new(items, total, limit, offset / limit))
    }

    #[instrument(skip(self))]
    pub async fn catalog_entry(&self, id: &ChallengeId) -> ChallengeResult<Challenge> {
        match self.store.get_challenge(id).await? {
            Some(c) if c.is_active => Ok(c),
            _ => Err(ChallengeError::ChallengeNotFound),
        }
    }

    /// Enrolls `user_id` in a catalog challenge.
    #[instrument(skip(self))]
    pub async fn join(
        &self,
        user_id: &UserId,
        challenge_id: &ChallengeId,
    ) -> ChallengeResult<JoinOutcome> {
        let challenge = self.catalog_entry(challenge_id).await?;
        challenge
            .validate()
            .map_err(ChallengeError::InvalidDefinition)?;

        if self
            .store
            .find_active_enrollment(user_id, challenge_id)
            .await?
            .is_some()
        {
            return Err(ChallengeError::AlreadyEnrolled);
        }

        let retry_count = self
            .store
            .count_unsuccessful_attempts(user_id, challenge_id)
            .await?;

        let created = enrollment::new_enrollment(
            &challenge,
            user_id,
            i32::try_from(retry_count).unwrap_or(i32::MAX),
            self.clock.now(),
        );

        self.store
            .insert_enrollment(&created)
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => ChallengeError::AlreadyEnrolled,
                other => other.into(),
            })?;

        if let Err(e) = self.store.increment_participants(challenge_id).await {
            tracing::warn!(error = ?e, challenge = %challenge_id, "failed to bump participant counter");
        }

        tracing::info!(user_challenge = %created.id, retry_count, "challenge joined");

        Ok(JoinOutcome {
            message: emitter::joined(&created),
            user_challenge: created,
        })
    }

    /// Records a dated check-in and returns the re-aggregated enrollment.
    #[instrument(skip(self, req))]
    pub async fn check_in(
        &self,
        user_id: &UserId,
        id: &UserChallengeId,
        req: CheckinRequest,
    ) -> ChallengeResult<CheckinOutcome> {
        let current = self.owned_enrollment(user_id, id).await?;
        if !current.is_active() {
            return Err(ChallengeError::NotActive(current.status));
        }

        let challenge = self
            .store
            .get_challenge(&current.challenge_id)
            .await?
            .ok_or(ChallengeError::ChallengeNotFound)?;

        let now = self.clock.now();
        let today = now.date_naive();
        if expiry::is_past_deadline(&challenge, &current, now) {
            return Err(ChallengeError::DeadlinePassed);
        }

        let checkin_date = req.checkin_date.unwrap_or(today);
        if checkin_date > today {
            return Err(ChallengeError::InvalidCheckinDate(format!(
                "check-in date {checkin_date} is in the future"
            )));
        }

        if checkin_date < current.joined_at.date_naive()
            || checkin_date > current.deadline.date_naive()
        {
            return Err(ChallengeError::InvalidCheckinDate(format!(
                "check-in date {checkin_date} is outside the challenge window"
            )));
        }

        let progress = ChallengeProgress::new_checkin(*id, req, checkin_date, today, now);
        let updated = self
            .store
            .append_checkin(&challenge, &progress, now)
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => ChallengeError::DuplicateCheckin(checkin_date),
                StoreError::NotActive(status) => ChallengeError::NotActive(status),
                other => other.into(),
            })?;

        let is_complete = updated.status == ChallengeStatus::Completed;
        if is_complete {
            tracing::info!(user_challenge = %id, points = updated.points_earned, "challenge completed");
        }

        Ok(CheckinOutcome {
            message: emitter::checked_in(&challenge, &progress, &updated),
            progress,
            challenge: updated,
            is_complete,
        })
    }

    /// Abandons an active enrollment, settling partial credit.
    #[instrument(skip(self))]
    pub async fn abandon(
        &self,
        user_id: &UserId,
        id: &UserChallengeId,
    ) -> ChallengeResult<AbandonOutcome> {
        let current = self.owned_enrollment(user_id, id).await?;
        if !current.is_active() {
            return Err(ChallengeError::NotActive(current.status));
        }

        let challenge = self
            .store
            .get_challenge(&current.challenge_id)
            .await?
            .ok_or(ChallengeError::ChallengeNotFound)?;

        let settled = self
            .store
            .settle_enrollment(&challenge, id, FailureReason::ManualAbandonment, self.clock.now())
            .await
            .map_err(|e| match e {
                StoreError::NotActive(status) => ChallengeError::NotActive(status),
                other => other.into(),
            })?;

        tracing::info!(user_challenge = %id, points = settled.points_earned, "challenge abandoned");

        Ok(AbandonOutcome {
            partial_points: settled.points_earned,
            message: emitter::abandoned(settled.points_earned),
        })
    }

    /// Fails every active enrollment that is past its deadline or over its missed-day limit.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self) -> ChallengeResult<SweepReport> {
        let now = self.clock.now();
        let active = self.store.list_active_enrollments().await?;
        let mut challenges: HashMap<ChallengeId, Option<Challenge>> = HashMap::new();
        let mut report = SweepReport {
            examined: active.len(),
            failed: 0,
        };

        for current in active {
            if !challenges.contains_key(&current.challenge_id) {
                let fetched = self.store.get_challenge(&current.challenge_id).await?;
                challenges.insert(current.challenge_id, fetched);
            }

            let Some(Some(challenge)) = challenges.get(&current.challenge_id) else {
                tracing::warn!(user_challenge = %current.id, "enrollment references a missing challenge");
                continue;
            };

            let rows = if challenge.max_missed_days.is_some() {
                self.store.list_progress(&current.id).await?
            } else {
                Vec::new()
            };

            let Some(reason) = expiry::failure_reason(challenge, &current, &rows, now) else {
                continue;
            };

            match self
                .store
                .settle_enrollment(challenge, &current.id, reason, now)
                .await
            {
                Ok(settled) => {
                    report.failed += 1;
                    tracing::info!(
                        user_challenge = %current.id,
                        %reason,
                        points = settled.points_earned,
                        "enrollment failed by sweep"
                    );
                }
                Err(StoreError::NotActive(status)) => {
                    tracing::debug!(user_challenge = %current.id, %status, "enrollment settled concurrently");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(report)
    }

    #[instrument(skip(self))]
    pub async fn enrollments(
        &self,
        user_id: &UserId,
        status: Option<ChallengeStatus>,
    ) -> ChallengeResult<Vec<UserChallenge>> {
        Ok(self.store.list_enrollments(user_id, status).await?)
    }

    #[instrument(skip(self))]
    pub async fn progress_log(
        &self,
        user_id: &UserId,
        id: &UserChallengeId,
    ) -> ChallengeResult<Vec<ChallengeProgress>> {
        let current = self.owned_enrollment(user_id, id).await?;
        Ok(self.store.list_progress(&current.id).await?)
    }

    #[instrument(skip(self))]
    pub async fn points_summary(&self, user_id: &UserId) -> ChallengeResult<PointsSummary> {
        let all = self.store.list_enrollments(user_id, None).await?;

        Ok(all.iter().fold(PointsSummary::default(), |mut acc, uc| {
            acc.total_points += i64::from(uc.points_earned);
            match uc.status {
                ChallengeStatus::Active => acc.active += 1,
                ChallengeStatus::Completed => acc.completed += 1,
                ChallengeStatus::Abandoned => acc.abandoned += 1,
                ChallengeStatus::Failed => acc.failed += 1,
            }
            acc
        }))
    }

    /// Enrollments owned by someone else are reported as missing.
    async fn owned_enrollment(
        &self,
        user_id: &UserId,
        id: &UserChallengeId,
    ) -> ChallengeResult<UserChallenge> {
        match self.store.get_enrollment(id).await? {
            Some(uc) if uc.is_owned_by(user_id) => Ok(uc),
            _ => Err(ChallengeError::EnrollmentNotFound),
        }
    }
}

#[cfg(test)]
mod test {
    use chrono::Duration;

    use super::*;
    use crate::challenge::fixtures;
    use crate::util::clock::FixedClock;

    struct Harness {
        service: ChallengeService,
        store: Arc<MemoryChallengeStore>,
        clock: Arc<FixedClock>,
    }

    fn harness(challenges: Vec<Challenge>) -> Harness {
        let store = Arc::new(MemoryChallengeStore::with_challenges(challenges));
        let clock = Arc::new(FixedClock::new(fixtures::epoch()));
        let service = ChallengeService::new(store.clone(), clock.clone());

        Harness {
            service,
            store,
            clock,
        }
    }

    fn user() -> UserId {
        UserId::from("user-1")
    }

    #[tokio::test]
    async fn test_second_join_conflicts() {
        let challenge = fixtures::flexible_challenge(7, 70);
        let h = harness(vec![challenge.clone()]);

        let joined = h.service.join(&user(), &challenge.id).await.unwrap();
        assert_eq!(joined.user_challenge.status, ChallengeStatus::Active);
        assert_eq!(
            joined.message,
            "Challenge joined! You have 7 days to complete it."
        );

        let err = h.service.join(&user(), &challenge.id).await.unwrap_err();
        assert!(matches!(err, ChallengeError::AlreadyEnrolled));

        let stored = h.store.get_challenge(&challenge.id).await.unwrap().unwrap();
        assert_eq!(stored.total_participants, 1);
    }

    #[tokio::test]
    async fn test_join_unknown_or_inactive_challenge() {
        let mut retired = fixtures::flexible_challenge(7, 70);
        retired.is_active = false;
        let h = harness(vec![retired.clone()]);

        let err = h.service.join(&user(), &retired.id).await.unwrap_err();
        assert!(matches!(err, ChallengeError::ChallengeNotFound));

        let missing = ChallengeId(uuid::Uuid::new_v4());
        let err = h.service.join(&user(), &missing).await.unwrap_err();
        assert!(matches!(err, ChallengeError::ChallengeNotFound));
    }

    #[tokio::test]
    async fn test_rejoin_after_abandon_counts_retry() {
        let challenge = fixtures::flexible_challenge(7, 70);
        let h = harness(vec![challenge.clone()]);

        let first = h.service.join(&user(), &challenge.id).await.unwrap();
        h.service
            .abandon(&user(), &first.user_challenge.id)
            .await
            .unwrap();

        let second = h.service.join(&user(), &challenge.id).await.unwrap();
        assert_eq!(second.user_challenge.retry_count, 1);
    }

    #[tokio::test]
    async fn test_seven_daily_checkins_complete_flexible_challenge() {
        let challenge = fixtures::flexible_challenge(7, 70);
        let h = harness(vec![challenge.clone()]);
        let id = h.service.join(&user(), &challenge.id).await.unwrap().user_challenge.id;

        let mut last_percent = 0;
        for day in 0..7 {
            let out = h
                .service
                .check_in(&user(), &id, CheckinRequest::default())
                .await
                .unwrap();

            assert_eq!(out.progress.progress_type, ProgressType::DailyCheckin);
            assert_eq!(out.challenge.checkins_completed, day + 1);
            assert!(out.challenge.progress_percent >= last_percent);
            last_percent = out.challenge.progress_percent;

            if day < 6 {
                assert!(!out.is_complete);
                assert_eq!(
                    out.message,
                    format!("✅ Progress logged! {}/7 complete", day + 1)
                );
            } else {
                assert!(out.is_complete);
                assert_eq!(out.challenge.status, ChallengeStatus::Completed);
                assert_eq!(out.challenge.points_earned, 70);
                assert_eq!(out.message, "🎉 Challenge complete! You earned 70 points!");
            }

            h.clock.advance(Duration::days(1));
        }

        let err = h
            .service
            .check_in(&user(), &id, CheckinRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ChallengeError::NotActive(ChallengeStatus::Completed)));
    }

    #[tokio::test]
    async fn test_duplicate_checkin_conflicts_without_side_effects() {
        let challenge = fixtures::flexible_challenge(7, 70);
        let h = harness(vec![challenge.clone()]);
        let id = h.service.join(&user(), &challenge.id).await.unwrap().user_challenge.id;

        h.service
            .check_in(&user(), &id, CheckinRequest::default())
            .await
            .unwrap();

        let err = h
            .service
            .check_in(&user(), &id, CheckinRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ChallengeError::DuplicateCheckin(d) if d == fixtures::day(0)));

        let stored = h.store.get_enrollment(&id).await.unwrap().unwrap();
        assert_eq!(stored.checkins_completed, 1);
    }

    #[tokio::test]
    async fn test_checkins_completed_matches_log() {
        let challenge = fixtures::flexible_challenge(7, 70);
        let h = harness(vec![challenge.clone()]);
        let id = h.service.join(&user(), &challenge.id).await.unwrap().user_challenge.id;

        for completed in [true, false, true, false] {
            h.service
                .check_in(
                    &user(),
                    &id,
                    CheckinRequest {
                        completed: Some(completed),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            h.clock.advance(Duration::days(1));
        }

        let log = h.service.progress_log(&user(), &id).await.unwrap();
        let stored = h.store.get_enrollment(&id).await.unwrap().unwrap();
        assert_eq!(
            stored.checkins_completed as usize,
            log.iter().filter(|p| p.completed).count()
        );
        assert_eq!(stored.checkins_completed, 2);
    }

    #[tokio::test]
    async fn test_retroactive_and_invalid_dates() {
        let challenge = fixtures::flexible_challenge(7, 70);
        let h = harness(vec![challenge.clone()]);
        let id = h.service.join(&user(), &challenge.id).await.unwrap().user_challenge.id;
        h.clock.advance(Duration::days(2));

        let out = h
            .service
            .check_in(
                &user(),
                &id,
                CheckinRequest {
                    checkin_date: Some(fixtures::day(1)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(out.progress.progress_type, ProgressType::RetroactiveCheckin);

        let future = CheckinRequest {
            checkin_date: Some(fixtures::day(3)),
            ..Default::default()
        };
        let err = h.service.check_in(&user(), &id, future).await.unwrap_err();
        assert!(matches!(err, ChallengeError::InvalidCheckinDate(_)));

        let before_join = CheckinRequest {
            checkin_date: Some(fixtures::day(-1)),
            ..Default::default()
        };
        let err = h.service.check_in(&user(), &id, before_join).await.unwrap_err();
        assert!(matches!(err, ChallengeError::InvalidCheckinDate(_)));
    }

    #[tokio::test]
    async fn test_streak_resets_through_service() {
        let challenge = fixtures::streak_challenge(5, 50);
        let h = harness(vec![challenge.clone()]);
        let id = h.service.join(&user(), &challenge.id).await.unwrap().user_challenge.id;

        let mut latest = None;
        for offset in [0, 1, 2, 4] {
            h.clock.set(fixtures::epoch() + Duration::days(offset));
            latest = Some(
                h.service
                    .check_in(&user(), &id, CheckinRequest::default())
                    .await
                    .unwrap(),
            );
        }

        let latest = latest.unwrap();
        assert_eq!(latest.challenge.current_streak, 1);
        assert_eq!(latest.challenge.checkins_completed, 4);
        assert_eq!(latest.message, "✅ Progress logged! 1/5 day streak");
        assert_eq!(latest.challenge.status, ChallengeStatus::Active);
    }

    #[tokio::test]
    async fn test_other_users_enrollment_is_not_found() {
        let challenge = fixtures::flexible_challenge(7, 70);
        let h = harness(vec![challenge.clone()]);
        let id = h.service.join(&user(), &challenge.id).await.unwrap().user_challenge.id;

        let intruder = UserId::from("user-2");
        let err = h
            .service
            .check_in(&intruder, &id, CheckinRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ChallengeError::EnrollmentNotFound));

        let err = h.service.abandon(&intruder, &id).await.unwrap_err();
        assert!(matches!(err, ChallengeError::EnrollmentNotFound));
    }

    #[tokio::test]
    async fn test_join_three_checkins_then_abandon() {
        let challenge = fixtures::flexible_challenge(7, 70);
        let h = harness(vec![challenge.clone()]);
        let id = h.service.join(&user(), &challenge.id).await.unwrap().user_challenge.id;

        for _ in 0..3 {
            h.service
                .check_in(&user(), &id, CheckinRequest::default())
                .await
                .unwrap();
            h.clock.advance(Duration::days(1));
        }

        let out = h.service.abandon(&user(), &id).await.unwrap();
        assert_eq!(out.partial_points, 30);
        assert_eq!(
            out.message,
            "Challenge abandoned. You earned 30 points for your progress."
        );

        let stored = h.store.get_enrollment(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, ChallengeStatus::Abandoned);
        assert_eq!(stored.points_earned, 30);
        assert_eq!(stored.partial_completion_percent, Some(42));

        let err = h.service.abandon(&user(), &id).await.unwrap_err();
        assert!(matches!(err, ChallengeError::NotActive(ChallengeStatus::Abandoned)));
    }

    /// Lands a pending check-in between the service's read and the settle write.
    #[derive(Debug)]
    struct LateCheckinStore {
        inner: Arc<MemoryChallengeStore>,
        pending: std::sync::Mutex<Option<ChallengeProgress>>,
    }

    #[async_trait::async_trait]
    impl ChallengeStore for LateCheckinStore {
        async fn list_challenges(
            &self,
            filter: &CatalogFilter,
            limit: i64,
            offset: i64,
        ) -> StoreResult<(Vec<Challenge>, i64)> {
            self.inner.list_challenges(filter, limit, offset).await
        }

        async fn get_challenge(&self, id: &ChallengeId) -> StoreResult<Option<Challenge>> {
            self.inner.get_challenge(id).await
        }

        async fn increment_participants(&self, id: &ChallengeId) -> StoreResult<()> {
            self.inner.increment_participants(id).await
        }

        async fn find_active_enrollment(
            &self,
            user_id: &UserId,
            challenge_id: &ChallengeId,
        ) -> StoreResult<Option<UserChallenge>> {
            self.inner.find_active_enrollment(user_id, challenge_id).await
        }

        async fn count_unsuccessful_attempts(
            &self,
            user_id: &UserId,
            challenge_id: &ChallengeId,
        ) -> StoreResult<i64> {
            self.inner.count_unsuccessful_attempts(user_id, challenge_id).await
        }

        async fn insert_enrollment(&self, item: &UserChallenge) -> StoreResult<()> {
            self.inner.insert_enrollment(item).await
        }

        async fn get_enrollment(&self, id: &UserChallengeId) -> StoreResult<Option<UserChallenge>> {
            self.inner.get_enrollment(id).await
        }

        async fn list_enrollments(
            &self,
            user_id: &UserId,
            status: Option<ChallengeStatus>,
        ) -> StoreResult<Vec<UserChallenge>> {
            self.inner.list_enrollments(user_id, status).await
        }

        async fn list_active_enrollments(&self) -> StoreResult<Vec<UserChallenge>> {
            self.inner.list_active_enrollments().await
        }

        async fn list_progress(&self, id: &UserChallengeId) -> StoreResult<Vec<ChallengeProgress>> {
            self.inner.list_progress(id).await
        }

        async fn append_checkin(
            &self,
            challenge: &Challenge,
            progress: &ChallengeProgress,
            now: chrono::DateTime<chrono::Utc>,
        ) -> StoreResult<UserChallenge> {
            self.inner.append_checkin(challenge, progress, now).await
        }

        async fn settle_enrollment(
            &self,
            challenge: &Challenge,
            id: &UserChallengeId,
            reason: FailureReason,
            now: chrono::DateTime<chrono::Utc>,
        ) -> StoreResult<UserChallenge> {
            let pending = self.pending.lock().unwrap().take();
            if let Some(row) = pending {
                self.inner.append_checkin(challenge, &row, now).await?;
            }
            self.inner.settle_enrollment(challenge, id, reason, now).await
        }
    }

    #[tokio::test]
    async fn test_abandon_keeps_checkin_landing_before_settle() {
        let challenge = fixtures::flexible_challenge(7, 70);
        let inner = Arc::new(MemoryChallengeStore::with_challenges([challenge.clone()]));
        let store = Arc::new(LateCheckinStore {
            inner: inner.clone(),
            pending: std::sync::Mutex::new(None),
        });
        let clock = Arc::new(FixedClock::new(fixtures::epoch()));
        let service = ChallengeService::new(store.clone(), clock.clone());

        let id = service.join(&user(), &challenge.id).await.unwrap().user_challenge.id;
        service
            .check_in(&user(), &id, CheckinRequest::default())
            .await
            .unwrap();

        clock.advance(Duration::days(1));
        *store.pending.lock().unwrap() = Some(fixtures::checkin(id, 1, true));

        let out = service.abandon(&user(), &id).await.unwrap();
        assert_eq!(out.partial_points, 20);

        let log = inner.list_progress(&id).await.unwrap();
        let stored = inner.get_enrollment(&id).await.unwrap().unwrap();
        assert_eq!(log.iter().filter(|p| p.completed).count(), 2);
        assert_eq!(stored.checkins_completed, 2);
        assert_eq!(stored.progress_percent, 28);
        assert_eq!(stored.partial_completion_percent, Some(28));
        assert_eq!(stored.points_earned, 20);
        assert_eq!(stored.status, ChallengeStatus::Abandoned);
    }

    #[tokio::test]
    async fn test_checkin_after_deadline_is_rejected() {
        let challenge = fixtures::flexible_challenge(7, 70);
        let h = harness(vec![challenge.clone()]);
        let id = h.service.join(&user(), &challenge.id).await.unwrap().user_challenge.id;

        h.clock.advance(Duration::days(8));
        let err = h
            .service
            .check_in(&user(), &id, CheckinRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ChallengeError::DeadlinePassed));
    }

    #[tokio::test]
    async fn test_sweep_fails_expired_enrollments() {
        let challenge = fixtures::flexible_challenge(7, 70);
        let h = harness(vec![challenge.clone()]);
        let expiring = h.service.join(&user(), &challenge.id).await.unwrap().user_challenge.id;

        for _ in 0..2 {
            h.service
                .check_in(&user(), &expiring, CheckinRequest::default())
                .await
                .unwrap();
            h.clock.advance(Duration::days(1));
        }

        h.clock.advance(Duration::days(4));
        let fresh = h
            .service
            .join(&UserId::from("user-2"), &challenge.id)
            .await
            .unwrap()
            .user_challenge
            .id;

        h.clock.advance(Duration::days(2));
        let report = h.service.sweep_expired().await.unwrap();
        assert_eq!(report, SweepReport { examined: 2, failed: 1 });

        let failed = h.store.get_enrollment(&expiring).await.unwrap().unwrap();
        assert_eq!(failed.status, ChallengeStatus::Failed);
        assert_eq!(failed.failure_reason.as_deref(), Some("deadline_expired"));
        assert_eq!(failed.points_earned, 20);

        let untouched = h.store.get_enrollment(&fresh).await.unwrap().unwrap();
        assert_eq!(untouched.status, ChallengeStatus::Active);

        // a second pass has nothing left to do for the failed row
        let report = h.service.sweep_expired().await.unwrap();
        assert_eq!(report.failed, 0);
    }

    #[tokio::test]
    async fn test_points_summary() {
        let a = fixtures::flexible_challenge(1, 10);
        let b = fixtures::flexible_challenge(7, 70);
        let h = harness(vec![a.clone(), b.clone()]);

        let done = h.service.join(&user(), &a.id).await.unwrap().user_challenge.id;
        h.service
            .check_in(&user(), &done, CheckinRequest::default())
            .await
            .unwrap();
        h.service.join(&user(), &b.id).await.unwrap();

        let summary = h.service.points_summary(&user()).await.unwrap();
        assert_eq!(
            summary,
            PointsSummary {
                total_points: 10,
                active: 1,
                completed: 1,
                abandoned: 0,
                failed: 0,
            }
        );

        let active = h
            .service
            .enrollments(&user(), Some(ChallengeStatus::Active))
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].challenge_id, b.id);
    }

    #[tokio::test]
    async fn test_catalog_listing_pages() {
        let challenges: Vec<_> = (0..5)
            .map(|i| {
                let mut c = fixtures::flexible_challenge(7, 70);
                c.created_at = fixtures::epoch() + Duration::minutes(i);
                c
            })
            .collect();
        let h = harness(challenges.clone());

        let page = h
            .service
            .list_catalog(&CatalogFilter::default(), &Pagination { limit: 2, page: 1 })
            .await
            .unwrap();

        assert_eq!(page.total_items, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page, 1);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].id, challenges[2].id);
    }
}
