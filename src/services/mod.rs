//! Service layer: credentials, photo storage and the profile workflows.

pub mod credentials;
pub mod files;
pub mod profile_update;
pub mod registration;

pub use credentials::{CredentialStore, HashingParams};
pub use files::{FileStore, Upload, UploadPolicy};
pub use profile_update::ProfileUpdateService;
pub use registration::RegistrationService;

use thiserror::Error;
use tracing::Instrument;

use crate::domain::FieldViolation;
use crate::repository::RepositoryError;
use credentials::CredentialError;
use files::FileStoreError;

/// Outcome of a failed registration or update.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Validation failed")]
    Validation(Vec<FieldViolation>),

    #[error("Username already taken")]
    UsernameTaken,

    #[error("User not found")]
    NotFound,

    #[error("Current password is incorrect")]
    IncorrectPassword,

    #[error("Profile was changed by another request, please retry")]
    ConcurrentUpdate,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(anyhow::anyhow!(msg.into()))
    }
}

/// Run a workflow that writes files and records on its own task.
///
/// Dropping the request future does not cancel the task, so a staged photo
/// is always committed or rolled back together with its record.
async fn run_detached<T, F>(workflow: F) -> Result<T, ServiceError>
where
    T: Send + 'static,
    F: std::future::Future<Output = Result<T, ServiceError>> + Send + 'static,
{
    tokio::spawn(workflow.in_current_span())
        .await
        .map_err(|e| ServiceError::internal(format!("Profile workflow task failed: {e}")))?
}

impl From<FileStoreError> for ServiceError {
    fn from(e: FileStoreError) -> Self {
        match e {
            FileStoreError::Rejected(reason) => {
                Self::Validation(vec![FieldViolation::new("profilePhoto", reason.to_string())])
            }
            other => Self::Internal(other.into()),
        }
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::UsernameTaken => Self::UsernameTaken,
            RepositoryError::NotFound => Self::NotFound,
            RepositoryError::StaleWrite => Self::ConcurrentUpdate,
            other => Self::Internal(other.into()),
        }
    }
}

impl From<CredentialError> for ServiceError {
    fn from(e: CredentialError) -> Self {
        Self::Internal(e.into())
    }
}
