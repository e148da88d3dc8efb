use std::sync::LazyLock;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::util::env;
use crate::util::env::Var;
use crate::var;

pub mod models;
pub mod repositories;

pub mod prelude {
    pub use crate::db::PgError;
    pub use crate::db::db_pool;

    pub use crate::db::models::challenge::{CatalogFilter, Challenge, ChallengeId, ChallengeType};
    pub use crate::db::models::progress::{
        ChallengeProgress, CheckinRequest, ProgressId, ProgressType,
    };
    pub use crate::db::models::user_challenge::{
        ChallengeStatus, FailureReason, UserChallenge, UserChallengeId, UserId,
    };
    pub use crate::db::models::{PaginatedResponse, Pagination};

    pub use crate::db::repositories::memory::MemoryChallengeStore;
    pub use crate::db::repositories::postgres::PgChallengeStore;
    pub use crate::db::repositories::{ChallengeStore, StoreError, StoreResult};
}

static DB_POOL: LazyLock<OnceCell<Db>> = LazyLock::new(OnceCell::new);
pub async fn db_pool() -> PgResult<&'static PgPool> {
    Ok(&DB_POOL
        .get_or_try_init(|| async { Db::new_pool().await })
        .await?
        .pool)
}

struct Db {
    pool: PgPool,
}

impl Db {
    pub async fn new_pool() -> PgResult<Self> {
        let db_url = var!(Var::DatabaseUrl).await?;
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(db_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("database migrations applied");

        Ok(Self { pool })
    }
}

pub type PgResult<T> = core::result::Result<T, PgError>;

#[allow(clippy::enum_variant_names)]
#[derive(Debug, Error)]
pub enum PgError {
    #[error(transparent)]
    SqlxError(#[from] sqlx::Error),

    #[error(transparent)]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("{0}")]
    EnvError(#[from] env::EnvErr),
}
