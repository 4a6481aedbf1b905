//! Upload storage service
//!
//! Persists client-uploaded attachments under a flat directory keyed by the
//! declared file name. All connections share one namespace; saving under an
//! existing name overwrites it (last writer wins).

use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

/// Errors raised by the upload store
#[derive(Error, Debug)]
pub enum UploadError {
    /// The declared name is empty or would escape the upload directory
    #[error("Invalid upload name: {0}")]
    InvalidName(String),
    /// Writing the file failed
    #[error("Failed to write upload: {0}")]
    Io(#[from] std::io::Error),
}

/// Flat file store for client-uploaded attachments
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    /// Open the store, creating the directory if it does not exist.
    pub async fn init(root: impl Into<PathBuf>) -> Result<Self, UploadError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        info!(dir = %root.display(), "Upload directory ready");
        Ok(Self { root })
    }

    /// Directory the store writes into
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist `content` under `name`, replacing any previous upload with
    /// the same name.
    ///
    /// # Arguments
    /// * `name` - Client-declared file name, validated before use
    /// * `content` - Raw file bytes
    ///
    /// # Returns
    /// * `Ok(PathBuf)` - Path the file was written to
    /// * `Err(UploadError)` - If the name is invalid or the write fails
    pub async fn save(&self, name: &str, content: &[u8]) -> Result<PathBuf, UploadError> {
        let name = validate_name(name)?;
        let path = self.root.join(name);
        fs::write(&path, content).await?;
        debug!(path = %path.display(), bytes = content.len(), "Upload saved");
        Ok(path)
    }
}

/// Accept only names that resolve to a single normal path component, so a
/// client-declared name cannot address anything outside the upload
/// directory.
fn validate_name(name: &str) -> Result<&str, UploadError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(name),
        _ => Err(UploadError::InvalidName(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn save_round_trips_bytes() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let store = UploadStore::init(temp_dir.path())
            .await
            .expect("Failed to open store");

        let content = b"alpha\x00beta\ngamma";
        let path = store
            .save("notes.txt", content)
            .await
            .expect("Failed to save upload");

        let stored = std::fs::read(&path).expect("Failed to read stored file");
        assert_eq!(stored, content);
        assert_eq!(path, temp_dir.path().join("notes.txt"));
    }

    #[tokio::test]
    async fn save_overwrites_existing_upload() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let store = UploadStore::init(temp_dir.path())
            .await
            .expect("Failed to open store");

        store.save("report.csv", b"first").await.expect("first save");
        let path = store
            .save("report.csv", b"second")
            .await
            .expect("second save");

        let stored = std::fs::read(&path).expect("Failed to read stored file");
        assert_eq!(stored, b"second");
    }

    #[tokio::test]
    async fn save_rejects_escaping_names() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let store = UploadStore::init(temp_dir.path())
            .await
            .expect("Failed to open store");

        for name in ["", "..", "../evil.txt", "nested/evil.txt", "/etc/passwd"] {
            let result = store.save(name, b"payload").await;
            match result {
                Err(UploadError::InvalidName(_)) => {}
                other => panic!("Expected InvalidName for {:?}, got: {:?}", name, other),
            }
        }
    }

    #[tokio::test]
    async fn init_creates_missing_directory() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let nested = temp_dir.path().join("data").join("uploads");

        let store = UploadStore::init(&nested).await.expect("Failed to init");
        assert!(nested.is_dir());
        assert_eq!(store.root(), nested.as_path());
    }
}
