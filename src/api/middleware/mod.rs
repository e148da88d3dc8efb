pub mod verify_identity;
pub mod verify_internal;

use http::request::Parts as ReqParts;
use http::{HeaderValue, Method, header};
use thiserror::Error;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::util::env::{EnvErr, Var};
use crate::var;

pub type MiddlewareResult<T> = core::result::Result<T, MiddlewareErr>;

#[derive(Debug, Error)]
pub enum MiddlewareErr {
    #[error(transparent)]
    EnvErr(#[from] EnvErr),

    #[error("missing authorization header")]
    MissingCredentials,

    #[error("malformed authorization header")]
    MalformedCredentials,

    #[error("invalid or expired token")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("invalid internal token")]
    InvalidInternalToken,
}

pub async fn cors() -> MiddlewareResult<CorsLayer> {
    let cors_allowed = var!(Var::CorsAllowOrigins).await?;

    let allowed = if cors_allowed == "*" {
        AllowOrigin::any()
    } else {
        AllowOrigin::predicate(|org: &HeaderValue, _: &ReqParts| {
            cors_allowed
                .split(',')
                .any(|suffix| org.as_bytes().ends_with(suffix.trim().as_bytes()))
        })
    };

    Ok(CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(allowed))
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub(crate) fn bearer_token(value: Option<&HeaderValue>) -> MiddlewareResult<&str> {
    let raw = value
        .ok_or(MiddlewareErr::MissingCredentials)?
        .to_str()
        .map_err(|_| MiddlewareErr::MalformedCredentials)?;

    raw.strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(MiddlewareErr::MalformedCredentials)
}
