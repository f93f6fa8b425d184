//! Uploaded account documents on local disk.

use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::services::accounts::ArtifactStore;

/// Errors from artifact deletion.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The stored path would resolve outside the artifact root.
    #[error("artifact path escapes the artifact root: {0}")]
    OutsideRoot(String),

    #[error("failed to delete {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Artifacts stored as files under a root directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a stored path against the root.
    ///
    /// Leading separators are ignored; `..` and drive prefixes are refused.
    fn resolve(&self, stored: &str) -> Result<PathBuf, ArtifactError> {
        let relative = Path::new(stored.trim_start_matches(['/', '\\']));
        let mut resolved = self.root.clone();

        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(ArtifactError::OutsideRoot(stored.to_owned()));
                }
            }
        }

        if resolved == self.root {
            return Err(ArtifactError::OutsideRoot(stored.to_owned()));
        }
        Ok(resolved)
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn delete_if_exists(&self, path: &str) -> Result<bool, ArtifactError> {
        let resolved = self.resolve(path)?;

        match tokio::fs::remove_file(&resolved).await {
            Ok(()) => {
                tracing::debug!(path = %resolved.display(), "Deleted artifact");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(ArtifactError::Io {
                path: path.to_owned(),
                source,
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deletes_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("licenses")).unwrap();
        std::fs::write(dir.path().join("licenses/p1.pdf"), b"%PDF").unwrap();
        let store = FsArtifactStore::new(dir.path());

        assert!(store.delete_if_exists("licenses/p1.pdf").await.unwrap());
        assert!(!dir.path().join("licenses/p1.pdf").exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());

        assert!(!store.delete_if_exists("images/none.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_leading_slash_is_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("logo.png"), b"png").unwrap();
        let store = FsArtifactStore::new(dir.path());

        assert!(store.delete_if_exists("/logo.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_parent_components_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().join("uploads"));

        let err = store.delete_if_exists("../secrets.txt").await.unwrap_err();
        assert!(matches!(err, ArtifactError::OutsideRoot(_)));

        let err = store.delete_if_exists("").await.unwrap_err();
        assert!(matches!(err, ArtifactError::OutsideRoot(_)));
    }

    #[tokio::test]
    async fn test_directory_reports_io_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("folder")).unwrap();
        let store = FsArtifactStore::new(dir.path());

        let err = store.delete_if_exists("folder").await.unwrap_err();
        assert!(matches!(err, ArtifactError::Io { .. }));
    }
}
