use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use http::header::AUTHORIZATION;

use super::{MiddlewareErr, bearer_token};
use crate::api::server::{AppState, RouteError};
use crate::util::constant_time_cmp;

/// Guards operator routes with the shared `INTERNAL_TOKEN`.
pub async fn verify_internal_ident(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, RouteError> {
    let token = bearer_token(req.headers().get(AUTHORIZATION))?;

    if state.internal_token.is_empty() || !constant_time_cmp(token, &state.internal_token) {
        return Err(MiddlewareErr::InvalidInternalToken.into());
    }

    Ok(next.run(req).await)
}
