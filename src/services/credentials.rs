//! Password hashing and verification.
//!
//! Argon2id with a random salt per hash. Hashing is CPU bound, so both
//! operations run on the blocking pool inside the caller's span.

use argon2::{
    password_hash::{rand_core, PasswordHasher, SaltString},
    Algorithm, Argon2, Params, PasswordHash, PasswordVerifier, Version,
};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Invalid hashing parameters: {0}")]
    InvalidParams(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

/// Argon2 cost parameters
#[derive(Debug, Clone, Copy)]
pub struct HashingParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashingParams {
    fn default() -> Self {
        Self {
            memory_kib: 15000,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Clone)]
pub struct CredentialStore {
    params: Params,
}

impl CredentialStore {
    pub fn new(params: HashingParams) -> Result<Self, CredentialError> {
        let params = Params::new(params.memory_kib, params.iterations, params.parallelism, None)
            .map_err(|e| CredentialError::InvalidParams(e.to_string()))?;
        Ok(Self { params })
    }

    fn hasher(params: Params) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    }

    /// Produce a salted PHC hash string for `password`.
    #[instrument(name = "Computing password hash", skip_all)]
    pub async fn hash(&self, password: SecretString) -> Result<SecretString, CredentialError> {
        let params = self.params.clone();
        let current_span = tracing::Span::current();

        tokio::task::spawn_blocking(move || {
            current_span.in_scope(|| {
                let salt = SaltString::generate(rand_core::OsRng);
                Self::hasher(params)
                    .hash_password(password.expose_secret().as_bytes(), &salt)
                    .map(|h| SecretString::new(h.to_string()))
                    .map_err(|e| CredentialError::Hashing(e.to_string()))
            })
        })
        .await
        .map_err(|e| CredentialError::Hashing(e.to_string()))?
    }

    /// Check `candidate` against a stored hash. Any mismatch, malformed hash
    /// or worker failure yields `false`.
    #[instrument(name = "Verifying password hash", skip_all)]
    pub async fn verify(&self, candidate: &SecretString, expected_hash: &SecretString) -> bool {
        let candidate = candidate.clone();
        let expected_hash = expected_hash.clone();
        let params = self.params.clone();
        let current_span = tracing::Span::current();

        let result = tokio::task::spawn_blocking(move || {
            current_span.in_scope(|| {
                let parsed = PasswordHash::new(expected_hash.expose_secret())
                    .map_err(|e| e.to_string())?;
                Ok::<bool, String>(
                    Self::hasher(params)
                        .verify_password(candidate.expose_secret().as_bytes(), &parsed)
                        .is_ok(),
                )
            })
        })
        .await;

        match result {
            Ok(Ok(matches)) => matches,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Stored credential hash is malformed");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Password verification task failed");
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn test_params() -> HashingParams {
    HashingParams {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}
