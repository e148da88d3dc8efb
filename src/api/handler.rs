use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::api::middleware::verify_identity::Identity;
use crate::api::server::{AppState, JsonResult, RouteError};
use crate::challenge::service::{PointsSummary, SweepReport};
use crate::db::prelude::*;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub success: bool,
    pub user_challenge: UserChallenge,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub success: bool,
    pub progress: ChallengeProgress,
    pub challenge: UserChallenge,
    pub is_complete: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbandonResponse {
    pub success: bool,
    pub partial_points: i32,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CatalogQuery {
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct EnrollmentQuery {
    pub status: Option<ChallengeStatus>,
}

fn parse_id<T: core::str::FromStr>(raw: &str, what: &str) -> Result<T, RouteError> {
    raw.parse()
        .map_err(|_| RouteError::Validation(format!("invalid {what} id '{raw}'")))
}

fn query<T>(res: Result<Query<T>, QueryRejection>) -> Result<T, RouteError> {
    res.map(|Query(q)| q)
        .map_err(|e| RouteError::Validation(e.body_text()))
}

#[instrument(skip(state))]
pub async fn join_challenge(
    State(state): State<Arc<AppState>>,
    Identity(user_id): Identity,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<JoinResponse>), RouteError> {
    let challenge_id: ChallengeId = parse_id(&id, "challenge")?;
    let outcome = state.service.join(&user_id, &challenge_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(JoinResponse {
            success: true,
            user_challenge: outcome.user_challenge,
            message: outcome.message,
        }),
    ))
}

/// An empty body logs a completed check-in for today.
#[instrument(skip(state, body))]
pub async fn log_progress(
    State(state): State<Arc<AppState>>,
    Identity(user_id): Identity,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<ProgressResponse>), RouteError> {
    let enrollment_id: UserChallengeId = parse_id(&id, "enrollment")?;
    let req = if body.iter().all(u8::is_ascii_whitespace) {
        CheckinRequest::default()
    } else {
        serde_json::from_slice::<CheckinRequest>(&body)
            .map_err(|e| RouteError::Validation(format!("invalid request body: {e}")))?
    };

    let outcome = state.service.check_in(&user_id, &enrollment_id, req).await?;

    Ok((
        StatusCode::CREATED,
        Json(ProgressResponse {
            success: true,
            progress: outcome.progress,
            challenge: outcome.challenge,
            is_complete: outcome.is_complete,
            message: outcome.message,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn abandon_challenge(
    State(state): State<Arc<AppState>>,
    Identity(user_id): Identity,
    Path(id): Path<String>,
) -> JsonResult<AbandonResponse> {
    let enrollment_id: UserChallengeId = parse_id(&id, "enrollment")?;
    let outcome = state.service.abandon(&user_id, &enrollment_id).await?;

    Ok(Json(AbandonResponse {
        success: true,
        partial_points: outcome.partial_points,
        message: outcome.message,
    }))
}

#[instrument(skip(state))]
pub async fn list_catalog(
    State(state): State<Arc<AppState>>,
    params: Result<Query<CatalogQuery>, QueryRejection>,
) -> JsonResult<PaginatedResponse<Challenge>> {
    let params = query(params)?;
    let defaults = Pagination::default();
    let pagination = Pagination {
        limit: params.limit.unwrap_or(defaults.limit),
        page: params.page.unwrap_or(defaults.page),
    };
    let filter = CatalogFilter {
        category: params.category,
        difficulty: params.difficulty,
    };

    Ok(Json(state.service.list_catalog(&filter, &pagination).await?))
}

#[instrument(skip(state))]
pub async fn catalog_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> JsonResult<Challenge> {
    let challenge_id: ChallengeId = parse_id(&id, "challenge")?;
    Ok(Json(state.service.catalog_entry(&challenge_id).await?))
}

#[instrument(skip(state))]
pub async fn my_challenges(
    State(state): State<Arc<AppState>>,
    Identity(user_id): Identity,
    params: Result<Query<EnrollmentQuery>, QueryRejection>,
) -> JsonResult<Vec<UserChallenge>> {
    let params = query(params)?;
    Ok(Json(
        state.service.enrollments(&user_id, params.status).await?,
    ))
}

#[instrument(skip(state))]
pub async fn my_progress(
    State(state): State<Arc<AppState>>,
    Identity(user_id): Identity,
    Path(id): Path<String>,
) -> JsonResult<Vec<ChallengeProgress>> {
    let enrollment_id: UserChallengeId = parse_id(&id, "enrollment")?;
    Ok(Json(
        state.service.progress_log(&user_id, &enrollment_id).await?,
    ))
}

#[instrument(skip(state))]
pub async fn my_points(
    State(state): State<Arc<AppState>>,
    Identity(user_id): Identity,
) -> JsonResult<PointsSummary> {
    Ok(Json(state.service.points_summary(&user_id).await?))
}

#[instrument(skip(state))]
pub async fn run_sweep(State(state): State<Arc<AppState>>) -> JsonResult<SweepReport> {
    Ok(Json(state.service.sweep_expired().await?))
}
