//! Shared fixtures for unit and router tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

use crate::app::AppState;
use crate::config::{Environment, Settings};
use crate::domain::{
    CandidateProfile, Gender, ProfileDetails, ProfileRecord, Profession, SubscriptionPlan,
};
use crate::repository::{InMemoryProfileRepository, ProfileRepository, RepositoryError};
use crate::services::credentials::test_params;
use crate::services::{
    CredentialStore, FileStore, ProfileUpdateService, RegistrationService, UploadPolicy,
};

/// A complete, valid registration candidate.
pub fn candidate(username: &str) -> CandidateProfile {
    CandidateProfile {
        username: username.to_string(),
        password: Some(SecretString::new("hunter2!x".into())),
        profession: "Student".into(),
        address_line1: "1 Main St".into(),
        country: "US".into(),
        state: "California".into(),
        city: "San Diego".into(),
        gender: "Male".into(),
        ..Default::default()
    }
}

/// A stored record with a placeholder credential hash.
pub fn record(username: &str) -> ProfileRecord {
    let now = Utc::now();
    ProfileRecord {
        id: Uuid::new_v4(),
        username: username.to_string(),
        credential_hash: SecretString::new("$argon2id$placeholder".into()),
        details: ProfileDetails {
            profession: Profession::Developer,
            company_name: None,
            address_line1: "1 Main St".into(),
            country: "US".into(),
            state: "California".into(),
            city: "San Diego".into(),
            subscription_plan: SubscriptionPlan::Basic,
            newsletter: false,
            gender: Gender::Female,
            custom_gender: None,
        },
        profile_photo: None,
        created_at: now,
        updated_at: now,
    }
}

/// Knobs shared between a [`TestHarness`] and its repository.
#[derive(Default)]
struct Faults {
    fail_writes: AtomicBool,
    read_delay_ms: AtomicU64,
    write_delay_ms: AtomicU64,
}

async fn pause(delay_ms: &AtomicU64) {
    let ms = delay_ms.load(Ordering::SeqCst);
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// In-memory repository with injectable failures and latency.
///
/// Read delays apply before the lookup; write delays apply after the write
/// has been stored.
struct FlakyRepository {
    inner: InMemoryProfileRepository,
    faults: Arc<Faults>,
}

impl FlakyRepository {
    fn check(&self) -> Result<(), RepositoryError> {
        if self.faults.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unexpected("write refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for FlakyRepository {
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<ProfileRecord>, RepositoryError> {
        pause(&self.faults.read_delay_ms).await;
        self.inner.find_by_username(username).await
    }

    async fn username_exists(&self, username: &str) -> Result<bool, RepositoryError> {
        self.inner.username_exists(username).await
    }

    async fn insert(&self, record: &ProfileRecord) -> Result<(), RepositoryError> {
        self.check()?;
        self.inner.insert(record).await?;
        pause(&self.faults.write_delay_ms).await;
        Ok(())
    }

    async fn update(
        &self,
        record: &ProfileRecord,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.check()?;
        self.inner.update(record, expected_updated_at).await?;
        pause(&self.faults.write_delay_ms).await;
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// Services wired against a temp upload directory and an in-memory store.
pub struct TestHarness {
    pub state: Arc<AppState>,
    pub registration: RegistrationService,
    pub updates: ProfileUpdateService,
    pub credentials: CredentialStore,
    pub files: FileStore,
    /// Direct view of the stored records, bypassing write failures.
    pub memory: InMemoryProfileRepository,
    faults: Arc<Faults>,
    _dir: TempDir,
}

impl TestHarness {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            env: Environment::Dev,
            server_addr: "127.0.0.1:0".into(),
            database_url: None,
            database_max_connections: 1,
            cors_allow_origins: vec!["http://localhost:3000".into()],
            upload_dir: dir.path().to_path_buf(),
            upload_public_path: "/uploads".into(),
            upload_max_bytes: UploadPolicy::default().max_bytes,
            password_hash: test_params(),
        };

        let memory = InMemoryProfileRepository::new();
        let faults = Arc::new(Faults::default());
        let profiles: Arc<dyn ProfileRepository> = Arc::new(FlakyRepository {
            inner: memory.clone(),
            faults: faults.clone(),
        });

        let files = FileStore::open(
            &settings.upload_dir,
            &settings.upload_public_path,
            settings.upload_policy(),
        )
        .await
        .unwrap();
        let credentials = CredentialStore::new(settings.password_hash).unwrap();

        let state = AppState::new(settings, profiles, files.clone(), credentials.clone());

        Self {
            registration: state.registration.clone(),
            updates: state.updates.clone(),
            state,
            credentials,
            files,
            memory,
            faults,
            _dir: dir,
        }
    }

    pub async fn with_failing_writes() -> Self {
        let harness = Self::new().await;
        harness.fail_writes();
        harness
    }

    pub fn fail_writes(&self) {
        self.faults.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Slow down every profile lookup by `delay`.
    pub fn delay_reads(&self, delay: Duration) {
        self.faults
            .read_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Hold every successful insert or update for `delay` after it is stored.
    pub fn delay_after_writes(&self, delay: Duration) {
        self.faults
            .write_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn upload_dir(&self) -> &Path {
        self.files.root()
    }
}

/// Poll `condition` every 10 ms until it holds, for at most two seconds.
pub async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
