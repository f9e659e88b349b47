//! Profile persistence port and its adapters

mod memory;
mod postgres;

pub use memory::InMemoryProfileRepository;
pub use postgres::PostgresProfileRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::ProfileRecord;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Username already taken")]
    UsernameTaken,
    #[error("Profile not found")]
    NotFound,
    #[error("Profile was changed by another request")]
    StaleWrite,
    #[error("Unexpected error {0}")]
    Unexpected(String),
}

impl PartialEq for RepositoryError {
    fn eq(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (Self::UsernameTaken, Self::UsernameTaken)
                | (Self::NotFound, Self::NotFound)
                | (Self::StaleWrite, Self::StaleWrite)
                | (Self::Unexpected(_), Self::Unexpected(_))
        )
    }
}

/// Durable store of profiles keyed by username.
///
/// `insert` must enforce username uniqueness itself and report a collision
/// as [`RepositoryError::UsernameTaken`]; callers only pre-check as a fast path.
///
/// `update` only writes when the stored `updated_at` still equals
/// `expected_updated_at`, and reports [`RepositoryError::StaleWrite`] otherwise.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_by_username(&self, username: &str)
        -> Result<Option<ProfileRecord>, RepositoryError>;
    async fn username_exists(&self, username: &str) -> Result<bool, RepositoryError>;
    async fn insert(&self, record: &ProfileRecord) -> Result<(), RepositoryError>;
    async fn update(
        &self,
        record: &ProfileRecord,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
    async fn health_check(&self) -> bool;
}
