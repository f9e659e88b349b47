//! Profile photo storage.
//!
//! Uploads are screened by a pure policy check, then written under the upload
//! directory and handed back as a [`StagedFile`]. A staged file is a pending
//! operation: the caller either commits it once the owning record is written,
//! or rolls it back.

use chrono::Utc;
use rand::Rng;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::instrument;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024;

const ALLOWED_TYPES: &[(&str, &str)] = &[("image/jpeg", "jpg"), ("image/png", "png")];

/// Limits applied to every upload before anything touches the disk.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_bytes: usize,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejection {
    #[error("Only JPG and PNG files are allowed.")]
    UnsupportedType,

    #[error("File size must not exceed {}.", display_size(.max_bytes))]
    TooLarge { max_bytes: usize },
}

/// Human-readable size in the largest unit that keeps the value at least 1.
fn display_size(bytes: &usize) -> String {
    let bytes = *bytes;
    const KB: usize = 1024;
    const MB: usize = 1024 * 1024;

    let (unit, name) = match bytes {
        b if b >= MB => (MB, "MB"),
        b if b >= KB => (KB, "KB"),
        _ => return format!("{bytes} bytes"),
    };

    if bytes % unit == 0 {
        format!("{} {name}", bytes / unit)
    } else {
        format!("{:.1} {name}", bytes as f64 / unit as f64)
    }
}

/// Accept or reject an upload by declared MIME type and size.
///
/// Returns the file extension to store the upload under.
pub fn screen_upload(
    policy: &UploadPolicy,
    content_type: &str,
    size: usize,
) -> Result<&'static str, UploadRejection> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let extension = ALLOWED_TYPES
        .iter()
        .find(|(allowed, _)| *allowed == mime)
        .map(|(_, ext)| *ext)
        .ok_or(UploadRejection::UnsupportedType)?;

    if size > policy.max_bytes {
        return Err(UploadRejection::TooLarge {
            max_bytes: policy.max_bytes,
        });
    }

    Ok(extension)
}

/// An uploaded binary as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error(transparent)]
    Rejected(#[from] UploadRejection),

    #[error("Staged file {0} is missing")]
    MissingStagedFile(String),

    #[error("File storage error: {0}")]
    Io(#[from] io::Error),
}

/// Durable storage for profile photos.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    public_prefix: String,
    policy: UploadPolicy,
}

impl FileStore {
    /// Open the store, creating the upload directory if needed.
    pub async fn open(
        root: impl Into<PathBuf>,
        public_prefix: &str,
        policy: UploadPolicy,
    ) -> io::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;

        Ok(Self {
            root,
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
            policy,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Screen and write an upload. Nothing is written when it is rejected.
    #[instrument(skip(self, upload), fields(content_type = %upload.content_type, size = upload.bytes.len()))]
    pub async fn stage(&self, upload: Upload) -> Result<StagedFile, FileStoreError> {
        let extension = screen_upload(&self.policy, &upload.content_type, upload.bytes.len())?;

        let suffix: u32 = rand::rng().random_range(0..1_000_000_000);
        let file_name = format!(
            "profile-{}-{}.{}",
            Utc::now().timestamp_millis(),
            suffix,
            extension
        );
        let path = self.root.join(&file_name);
        let partial = self.root.join(format!(".{file_name}.part"));

        if let Err(e) = tokio::fs::write(&partial, &upload.bytes).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&partial, &path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }

        let reference = format!("{}/{}", self.public_prefix, file_name);
        tracing::debug!(reference = %reference, "Staged upload");

        Ok(StagedFile {
            reference,
            path,
            armed: true,
        })
    }

    /// Delete the file behind `reference`. Missing files are not an error.
    #[instrument(skip(self))]
    pub async fn discard(&self, reference: &str) -> Result<(), FileStoreError> {
        let Some(path) = self.resolve(reference) else {
            tracing::warn!(reference, "Ignoring reference outside the upload directory");
            return Ok(());
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(reference, "Discarded stored file");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Commit `staged` in place of `previous`.
    ///
    /// The staged file is committed before the first await. The previous
    /// file is only removed once the staged file is confirmed on disk, so a
    /// failed replace never leaves the record without a photo.
    #[instrument(skip(self, staged), fields(new = %staged.reference()))]
    pub async fn replace(
        &self,
        previous: Option<&str>,
        staged: StagedFile,
    ) -> Result<String, FileStoreError> {
        let path = staged.path.clone();
        let reference = staged.commit();

        if !tokio::fs::try_exists(&path).await? {
            return Err(FileStoreError::MissingStagedFile(reference));
        }

        if let Some(previous) = previous.filter(|p| *p != reference) {
            self.discard(previous).await?;
        }
        Ok(reference)
    }

    /// Whether the file behind `reference` exists.
    pub async fn exists(&self, reference: &str) -> bool {
        match self.resolve(reference) {
            Some(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            None => false,
        }
    }

    /// Map a public reference to a path inside the upload directory.
    pub fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let name = reference
            .strip_prefix(&self.public_prefix)?
            .strip_prefix('/')?;

        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(file)), None) => Some(self.root.join(file)),
            _ => None,
        }
    }
}

/// An upload written to storage but not yet owned by a record.
///
/// Dropping a staged file without [`commit`](Self::commit) or
/// [`rollback`](Self::rollback) deletes it.
#[must_use = "a staged file must be committed or rolled back"]
#[derive(Debug)]
pub struct StagedFile {
    reference: String,
    path: PathBuf,
    armed: bool,
}

impl StagedFile {
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Keep the file and return its reference.
    pub fn commit(mut self) -> String {
        self.armed = false;
        std::mem::take(&mut self.reference)
    }

    /// Delete the file.
    pub async fn rollback(mut self) {
        self.armed = false;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => tracing::debug!(reference = %self.reference, "Rolled back staged file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::error!(reference = %self.reference, error = %e, "Failed to roll back staged file")
            }
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(reference = %self.reference, "Staged file dropped unresolved, removing");
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::error!(reference = %self.reference, error = %e, "Failed to remove staged file");
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn png(bytes: &[u8]) -> Upload {
    Upload {
        content_type: "image/png".into(),
        bytes: bytes.to_vec(),
    }
}

#[cfg(test)]
pub(crate) fn stored_files(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok().map(|e| e.path())).collect())
        .unwrap_or_default()
}
