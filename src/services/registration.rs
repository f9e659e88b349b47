//! Profile registration
//!
//! Stage upload, validate, check uniqueness, hash, insert. The workflow runs
//! on its own task; once the photo is staged it is either committed with the
//! new record or rolled back, even if the caller stops waiting.

use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::credentials::CredentialStore;
use super::files::{FileStore, Upload};
use super::{run_detached, ServiceError};
use crate::domain::{validation, CandidateProfile, ProfileRecord};
use crate::repository::ProfileRepository;

#[derive(Clone)]
pub struct RegistrationService {
    credentials: CredentialStore,
    files: FileStore,
    profiles: Arc<dyn ProfileRepository>,
}

impl RegistrationService {
    pub fn new(
        credentials: CredentialStore,
        files: FileStore,
        profiles: Arc<dyn ProfileRepository>,
    ) -> Self {
        Self {
            credentials,
            files,
            profiles,
        }
    }

    #[instrument(skip_all, fields(username = %candidate.username, has_photo = upload.is_some()))]
    pub async fn register(
        &self,
        candidate: CandidateProfile,
        upload: Option<Upload>,
    ) -> Result<ProfileRecord, ServiceError> {
        let service = self.clone();
        run_detached(async move { service.stage_and_create(candidate, upload).await }).await
    }

    async fn stage_and_create(
        &self,
        candidate: CandidateProfile,
        upload: Option<Upload>,
    ) -> Result<ProfileRecord, ServiceError> {
        let staged = match upload {
            Some(upload) => Some(self.files.stage(upload).await?),
            None => None,
        };
        let photo = staged.as_ref().map(|s| s.reference().to_string());

        match self.create(candidate, photo).await {
            Ok(record) => {
                if let Some(staged) = staged {
                    staged.commit();
                }
                tracing::info!(username = %record.username, "Profile registered");
                Ok(record)
            }
            Err(e) => {
                if let Some(staged) = staged {
                    staged.rollback().await;
                }
                Err(e)
            }
        }
    }

    async fn create(
        &self,
        candidate: CandidateProfile,
        profile_photo: Option<String>,
    ) -> Result<ProfileRecord, ServiceError> {
        let validated = validation::validate(candidate).map_err(ServiceError::Validation)?;

        if self.profiles.username_exists(&validated.username).await? {
            return Err(ServiceError::UsernameTaken);
        }

        let password = validated
            .password
            .ok_or_else(|| ServiceError::internal("Registration candidate without password"))?;
        let credential_hash = self.credentials.hash(password).await?;

        let now = Utc::now();
        let record = ProfileRecord {
            id: Uuid::new_v4(),
            username: validated.username,
            credential_hash,
            details: validated.details,
            profile_photo,
            created_at: now,
            updated_at: now,
        };

        // The pre-check above can race; the repository constraint decides.
        self.profiles.insert(&record).await?;

        Ok(record)
    }
}
