use chrono::NaiveDate;
use thiserror::Error;

use crate::db::prelude::{ChallengeStatus, StoreError};

pub mod aggregate;
pub mod emitter;
pub mod enrollment;
pub mod expiry;
pub mod service;
pub mod settlement;

#[cfg(test)]
pub(crate) mod fixtures;

pub use service::ChallengeService;

pub type ChallengeResult<T> = core::result::Result<T, ChallengeError>;

#[derive(Debug, Error)]
pub enum ChallengeError {
    #[error("challenge not found")]
    ChallengeNotFound,

    #[error("challenge enrollment not found")]
    EnrollmentNotFound,

    #[error("already enrolled in this challenge")]
    AlreadyEnrolled,

    #[error("a check-in already exists for {0}")]
    DuplicateCheckin(NaiveDate),

    #[error("challenge is not active (status: {0})")]
    NotActive(ChallengeStatus),

    #[error("challenge deadline has passed")]
    DeadlinePassed,

    #[error("{0}")]
    InvalidCheckinDate(String),

    #[error("challenge definition is invalid: {0}")]
    InvalidDefinition(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
