use std::num::ParseIntError;
use std::sync::Arc;

use challenge_server::api::server::{self, AppState, ServerErr};
use challenge_server::challenge::ChallengeService;
use challenge_server::db::prelude::*;
use challenge_server::jobs;
use challenge_server::util::clock::SystemClock;
use challenge_server::util::env::{self, EnvErr};
use challenge_server::util::telemetry;
use futures::future::join_all;
use thiserror::Error;

use crate::args::Command;

mod args;

#[derive(Debug, Error)]
enum RunnerErr {
    #[error(transparent)]
    Env(#[from] EnvErr),

    #[error(transparent)]
    Db(#[from] PgError),

    #[error(transparent)]
    Server(#[from] ServerErr),

    #[error(transparent)]
    Challenge(#[from] challenge_server::challenge::ChallengeError),

    #[error("invalid SERVER_API_PORT: {0}")]
    Port(#[from] ParseIntError),

    #[error(transparent)]
    Telemetry(#[from] Box<dyn std::error::Error + Send + Sync>),
}

type Result<T> = core::result::Result<T, RunnerErr>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = args::parse_cli_args();
    let config = env::config().await?;
    let telemetry_registry = telemetry::Telemetry::new().await?.register();

    let pool = db_pool().await?;
    let store = Arc::new(PgChallengeStore::new(pool.clone()));
    let service = ChallengeService::new(store, Arc::new(SystemClock));

    let res = match cli.command() {
        Command::Sweep => run_sweep_once(&service).await,
        Command::Serve => {
            let port = match cli.port {
                Some(p) => p,
                None => config.server_api_port.parse::<u16>()?,
            };
            serve(service, config, port).await
        }
    };

    if let Err(e) = &res {
        tracing::error!(error = ?e, "exiting with error");
    }

    telemetry_registry.shutdown();
    res
}

async fn run_sweep_once(service: &ChallengeService) -> Result<()> {
    let report = service.sweep_expired().await?;
    tracing::info!(
        examined = report.examined,
        failed = report.failed,
        "one-shot expiry sweep finished"
    );

    Ok(())
}

async fn serve(service: ChallengeService, config: &'static env::Env, port: u16) -> Result<()> {
    tracing::info!("starting challenge server");

    let state = Arc::new(AppState {
        service: service.clone(),
        jwt_secret: config.jwt_secret.clone(),
        internal_token: config.internal_token.clone(),
    });

    let handles = vec![
        server::start_server(state, port).await?,
        jobs::spawn_sweeper(service, config.sweep_interval()),
    ];
    let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

    tokio::select! {
        _ = join_all(handles) => {
            tracing::warn!("all tasks exited");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
            aborts.iter().for_each(|h| h.abort());
        }
    }

    Ok(())
}
