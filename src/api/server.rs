use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{MatchedPath, Request};
use axum::middleware::{Next, from_fn, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::api::handler::*;
use crate::api::middleware::verify_identity::verify_bearer_ident;
use crate::api::middleware::verify_internal::verify_internal_ident;
use crate::api::middleware::{self, MiddlewareErr};
use crate::challenge::{ChallengeError, ChallengeService};

pub type JsonResult<T> = core::result::Result<Json<T>, RouteError>;

#[derive(Clone, Debug)]
pub struct AppState {
    pub service: ChallengeService,
    pub jwt_secret: String,
    pub internal_token: String,
}

/// Builds the full route tree. CORS is layered on by [`start_server`].
pub fn app(state: Arc<AppState>) -> Router {
    let member_routes = Router::new()
        .route("/challenges/{id}/join", post(join_challenge))
        .route("/challenges/{id}/progress", post(log_progress))
        .route("/challenges/{id}/abandon", post(abandon_challenge))
        .route("/me/challenges", get(my_challenges))
        .route("/me/challenges/{id}/progress", get(my_progress))
        .route("/me/points", get(my_points))
        .route_layer(from_fn_with_state(state.clone(), verify_bearer_ident));

    let internal_routes = Router::new()
        .route("/internal/sweep", post(run_sweep))
        .route_layer(from_fn_with_state(state.clone(), verify_internal_ident));

    Router::new()
        .merge(member_routes)
        .merge(internal_routes)
        .route("/health", get(|| async { StatusCode::OK }))
        .route("/challenges", get(list_catalog))
        .route("/challenges/{id}", get(catalog_entry))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method();
                let uri = req.uri();

                let matched_path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|matched| matched.as_str());

                tracing::debug_span!("api_request", ?method, ?uri, ?matched_path)
            }),
        )
        .layer(from_fn(log_route_errors))
        .with_state(state)
}

/// Logs the `RouteError` behind any server-side failure response
#[instrument(skip(request, next), fields(uri = request.uri().to_string()))]
async fn log_route_errors(request: Request, next: Next) -> Response {
    let res = next.run(request).await;
    if let Some(err) = res.extensions().get::<Arc<RouteError>>() {
        tracing::error!(error = ?err, "error occurred inside route handler");
    }

    res
}

#[instrument(skip(state))]
pub async fn start_server(state: Arc<AppState>, port: u16) -> Result<JoinHandle<()>, ServerErr> {
    let router = app(state).layer(middleware::cors().await?);

    let socket_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), port);
    let listener = tokio::net::TcpListener::bind(socket_addr).await?;

    tracing::info!(
        server_url = &format!("http://127.0.0.1:{}", socket_addr.port()),
        "server ready"
    );

    Ok(tokio::task::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = ?e, "server exited with error");
        }
    }))
}

#[derive(Debug, Error)]
pub enum ServerErr {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Middleware(#[from] MiddlewareErr),
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Challenge(#[from] ChallengeError),

    #[error(transparent)]
    Middleware(#[from] MiddlewareErr),

    #[error("{0}")]
    Validation(String),
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
        }

        const INTERNAL: &str = "internal server error";

        let (status, error) = match &self {
            RouteError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),

            RouteError::Middleware(MiddlewareErr::EnvErr(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
            }
            RouteError::Middleware(err) => (StatusCode::UNAUTHORIZED, err.to_string()),

            RouteError::Challenge(err) => match err {
                ChallengeError::ChallengeNotFound | ChallengeError::EnrollmentNotFound => {
                    (StatusCode::NOT_FOUND, err.to_string())
                }
                ChallengeError::AlreadyEnrolled
                | ChallengeError::DuplicateCheckin(_)
                | ChallengeError::NotActive(_)
                | ChallengeError::DeadlinePassed => (StatusCode::CONFLICT, err.to_string()),
                ChallengeError::InvalidCheckinDate(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                ChallengeError::InvalidDefinition(_) | ChallengeError::Store(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
                }
            },
        };

        let mut response = (status, Json(ErrorResponse { error })).into_response();
        if status.is_server_error() {
            response.extensions_mut().insert(Arc::new(self));
        } else {
            tracing::debug!(%status, reason = %self, "request rejected");
        }

        response
    }
}
