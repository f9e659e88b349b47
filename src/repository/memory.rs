use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{ProfileRepository, RepositoryError};
use crate::domain::ProfileRecord;

/// Process-local repository, used when no database is configured and in tests.
#[derive(Default, Clone)]
pub struct InMemoryProfileRepository {
    profiles: Arc<RwLock<HashMap<String, ProfileRecord>>>,
}

impl InMemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<ProfileRecord>, RepositoryError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(username).cloned())
    }

    async fn username_exists(&self, username: &str) -> Result<bool, RepositoryError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.contains_key(username))
    }

    async fn insert(&self, record: &ProfileRecord) -> Result<(), RepositoryError> {
        let mut profiles = self.profiles.write().await;
        if profiles.contains_key(&record.username) {
            return Err(RepositoryError::UsernameTaken);
        }
        profiles.insert(record.username.clone(), record.clone());
        Ok(())
    }

    async fn update(
        &self,
        record: &ProfileRecord,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut profiles = self.profiles.write().await;
        let existing = profiles
            .get_mut(&record.username)
            .ok_or(RepositoryError::NotFound)?;
        if existing.updated_at != expected_updated_at {
            return Err(RepositoryError::StaleWrite);
        }
        *existing = record.clone();
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }
}
