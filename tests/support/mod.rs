#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use chrono::{DateTime, TimeZone, Utc};
use challenge_server::api::middleware::verify_identity::Claims;
use challenge_server::api::server::{AppState, app};
use challenge_server::challenge::ChallengeService;
use challenge_server::db::prelude::*;
use challenge_server::util::clock::FixedClock;
use http::{Method, Request, Response, StatusCode, header};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const INTERNAL_TOKEN: &str = "test-internal-token";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryChallengeStore>,
    pub clock: Arc<FixedClock>,
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

/// A seven day flexible challenge worth 70 points, one check-in required per day.
pub fn weekly_challenge() -> Challenge {
    Challenge {
        id: ChallengeId(Uuid::new_v4()),
        title: String::from("Track every expense"),
        description: String::from("Log each purchase for a week"),
        category: String::from("budgeting"),
        difficulty: String::from("easy"),
        challenge_type: ChallengeType::Flexible,
        duration_days: 7,
        required_checkins: Some(7),
        required_consecutive_days: None,
        points_full: 70,
        points_partial_enabled: true,
        grace_period_hours: 0,
        max_missed_days: None,
        failure_condition: None,
        is_active: true,
        total_participants: 0,
        created_at: start(),
    }
}

impl TestApp {
    pub fn new(challenges: Vec<Challenge>) -> Self {
        let store = Arc::new(MemoryChallengeStore::with_challenges(challenges));
        let clock = Arc::new(FixedClock::new(start()));
        let state = Arc::new(AppState {
            service: ChallengeService::new(store.clone(), clock.clone()),
            jwt_secret: JWT_SECRET.to_string(),
            internal_token: INTERNAL_TOKEN.to_string(),
        });

        Self {
            router: app(state),
            store,
            clock,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let res: Response<Body> = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, body)
    }

    pub async fn post_as(&self, user: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(request(Method::POST, uri, Some(&token_for(user)), body))
            .await
    }

    pub async fn get_as(&self, user: &str, uri: &str) -> (StatusCode, Value) {
        self.send(request(Method::GET, uri, Some(&token_for(user)), None))
            .await
    }
}

pub fn token_for(user: &str) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user.to_string(),
        exp: now + 3600,
        iat: Some(now),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn request(method: Method, uri: &str, bearer: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
