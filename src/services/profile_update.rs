//! Profile updates
//!
//! Partial field changes, password changes and photo replacement. A new
//! photo is staged up front and only replaces the old one after the record
//! write succeeded; on any failure the new file is rolled back and the old
//! file and record stay as they were. The write is conditional on the
//! record being unchanged since it was loaded, so of two racing updates only
//! one keeps its photo.

use chrono::Utc;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::instrument;

use super::credentials::CredentialStore;
use super::files::{FileStore, Upload};
use super::{run_detached, ServiceError};
use crate::domain::{
    validation, CandidateProfile, FieldViolation, PasswordChange, ProfilePatch, ProfileRecord,
};
use crate::repository::ProfileRepository;

#[derive(Clone)]
pub struct ProfileUpdateService {
    credentials: CredentialStore,
    files: FileStore,
    profiles: Arc<dyn ProfileRepository>,
}

impl ProfileUpdateService {
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

    #[instrument(skip(self, patch, password_change, upload), fields(
        password_change = password_change.is_some(),
        has_photo = upload.is_some(),
    ))]
    pub async fn update(
        &self,
        username: &str,
        patch: ProfilePatch,
        password_change: Option<PasswordChange>,
        upload: Option<Upload>,
    ) -> Result<ProfileRecord, ServiceError> {
        let service = self.clone();
        let username = username.to_string();
        run_detached(async move {
            service
                .stage_and_apply(&username, patch, password_change, upload)
                .await
        })
        .await
    }

    async fn stage_and_apply(
        &self,
        username: &str,
        patch: ProfilePatch,
        password_change: Option<PasswordChange>,
        upload: Option<Upload>,
    ) -> Result<ProfileRecord, ServiceError> {
        let staged = match upload {
            Some(upload) => Some(self.files.stage(upload).await?),
            None => None,
        };
        let new_photo = staged.as_ref().map(|s| s.reference().to_string());

        let (record, previous_photo) =
            match self.apply(username, patch, password_change, new_photo).await {
                Ok(applied) => applied,
                Err(e) => {
                    if let Some(staged) = staged {
                        staged.rollback().await;
                    }
                    return Err(e);
                }
            };

        if let Some(staged) = staged {
            // The record already points at the new file. `replace` commits it
            // before its first await, so a failure here can only leave the
            // old file behind.
            if let Err(e) = self.files.replace(previous_photo.as_deref(), staged).await {
                tracing::error!(
                    error = %e,
                    previous = ?previous_photo,
                    "Failed to remove replaced profile photo"
                );
            }
        }

        tracing::info!(username, "Profile updated");
        Ok(record)
    }

    /// Load, merge, validate and persist. Returns the written record and the
    /// photo reference it replaced.
    async fn apply(
        &self,
        username: &str,
        patch: ProfilePatch,
        password_change: Option<PasswordChange>,
        new_photo: Option<String>,
    ) -> Result<(ProfileRecord, Option<String>), ServiceError> {
        let existing = self
            .profiles
            .find_by_username(username)
            .await?
            .ok_or(ServiceError::NotFound)?;

        let mut candidate = CandidateProfile::from_record(&existing);
        if let Some(change) = &password_change {
            if !self
                .credentials
                .verify(&change.current_password, &existing.credential_hash)
                .await
            {
                return Err(ServiceError::IncorrectPassword);
            }
            candidate.password = Some(change.new_password.clone());
        }
        patch.apply_to(&mut candidate);

        let validated = validation::validate(candidate).map_err(|violations| {
            ServiceError::Validation(rename_password_field(violations, password_change.is_some()))
        })?;

        let credential_hash = match validated.password {
            Some(new_password) => self.credentials.hash(new_password).await?,
            None => existing.credential_hash.clone(),
        };

        let previous_photo = existing.profile_photo.clone();
        let loaded_at = existing.updated_at;
        let record = ProfileRecord {
            credential_hash,
            details: validated.details,
            profile_photo: new_photo.or(existing.profile_photo),
            updated_at: Utc::now(),
            ..existing
        };

        self.profiles.update(&record, loaded_at).await?;

        Ok((record, previous_photo))
    }

    /// Check `password` against the stored credential for `username`.
    #[instrument(skip(self, password))]
    pub async fn verify_current_password(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<(), ServiceError> {
        let existing = self
            .profiles
            .find_by_username(username)
            .await?
            .ok_or(ServiceError::NotFound)?;

        if self.credentials.verify(password, &existing.credential_hash).await {
            Ok(())
        } else {
            Err(ServiceError::IncorrectPassword)
        }
    }
}

// On update the new password arrives as `newPassword`.
fn rename_password_field(violations: Vec<FieldViolation>, changing: bool) -> Vec<FieldViolation> {
    if !changing {
        return violations;
    }
    violations
        .into_iter()
        .map(|v| {
            if v.field == "password" {
                FieldViolation::new("newPassword", v.message)
            } else {
                v
            }
        })
        .collect()
}
