//! Local image directory.
//!
//! Downloaded images are written to one flat directory, named after the
//! last path segment of their source URL. Two different cats whose URLs
//! share a basename overwrite each other.

use std::path::{Path, PathBuf};

use reqwest::Url;
use thiserror::Error;

/// Stored in place of a file path when an image could not be saved.
pub const IMAGE_SAVE_FAILED: &str = "download_failed";

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("cannot derive a file name from image URL '{0}'")]
    BadUrl(String),

    #[error("failed to write image to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Directory that receives downloaded images.
#[derive(Debug, Clone)]
pub struct ImageDir {
    root: PathBuf,
}

impl ImageDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `bytes` under the URL's basename and returns the file path.
    /// The directory is created on first use.
    pub async fn save(&self, url: &str, bytes: &[u8]) -> Result<PathBuf, ImageError> {
        let name = file_name_from_url(url)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| ImageError::Io {
                path: self.root.clone(),
                source,
            })?;

        let path = self.root.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| ImageError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}

/// Last non-empty path segment of `url`, ignoring query and fragment.
pub fn file_name_from_url(url: &str) -> Result<String, ImageError> {
    let parsed = Url::parse(url).map_err(|_| ImageError::BadUrl(url.to_string()))?;
    parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .filter(|name| *name != "." && *name != "..")
        .map(str::to_string)
        .ok_or_else(|| ImageError::BadUrl(url.to_string()))
}
