//! Destination for generated export files.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::config::ExportConfig;
use crate::error::{HistoryError, HistoryResult};

/// Where an artifact ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocation {
    pub filename: String,
    pub download_url: String,
    /// Bytes written.
    pub size: usize,
}

/// Writes export artifacts and reports how to download them.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(&self, filename: &str, content: &[u8]) -> HistoryResult<ArtifactLocation>;
}

/// Artifact store backed by a local directory.
///
/// Files land in `<directory>/exports/`; the reported URL follows the
/// bucket layout `{url_base}/{bucket}/exports/{filename}`.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
    url_base: String,
    bucket: String,
}

impl LocalArtifactStore {
    pub fn new(config: &ExportConfig) -> Self {
        Self {
            root: config.directory.join("exports"),
            url_base: config.url_base.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
        }
    }

    /// Directory the files are written to.
    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn download_url(&self, filename: &str) -> String {
        format!("{}/{}/exports/{}", self.url_base, self.bucket, filename)
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn put(&self, filename: &str, content: &[u8]) -> HistoryResult<ArtifactLocation> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| HistoryError::Artifact {
                message: format!("failed to create {}: {}", self.root.display(), e),
            })?;

        let path = self.root.join(filename);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| HistoryError::Artifact {
                message: format!("failed to write {}: {}", path.display(), e),
            })?;

        debug!(path = %path.display(), bytes = content.len(), "Export artifact written");

        Ok(ArtifactLocation {
            filename: filename.to_string(),
            download_url: self.download_url(filename),
            size: content.len(),
        })
    }
}
