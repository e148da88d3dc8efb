use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use http::header::AUTHORIZATION;
use http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use super::{MiddlewareErr, MiddlewareResult, bearer_token};
use crate::api::server::{AppState, RouteError};
use crate::db::prelude::UserId;

/// JWT claims issued by the identity provider. Only `sub` and `exp` are read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
}

/// Caller identity, placed in request extensions by [`verify_bearer_ident`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(pub UserId);

/// Checks the HS256 signature and expiry of `token`, returning its subject.
pub fn decode_identity(secret: &str, token: &str) -> MiddlewareResult<UserId> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);

    let data = decode::<Claims>(token, &key, &validation)?;
    if data.claims.sub.trim().is_empty() {
        return Err(MiddlewareErr::MalformedCredentials);
    }

    Ok(UserId(data.claims.sub))
}

pub async fn verify_bearer_ident(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, RouteError> {
    let token = bearer_token(req.headers().get(AUTHORIZATION))?;
    let user_id = decode_identity(&state.jwt_secret, token)?;

    req.extensions_mut().insert(Identity(user_id));

    Ok(next.run(req).await)
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = RouteError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(RouteError::Middleware(MiddlewareErr::MissingCredentials))
    }
}
