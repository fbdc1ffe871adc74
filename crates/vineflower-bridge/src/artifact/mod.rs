//! Local engine archive cache with conditional re-fetch.

pub mod downloader;
pub mod layout;

pub use downloader::{ensure_artifact, fetch_artifact};

use crate::config::Configuration;
use crate::resolver::VersionCatalog;
use crate::utils::Version;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("No Vineflower version pinned and none cached in {cache_dir:?}")]
    NoUsableVersion { cache_dir: PathBuf },
    #[error("Cannot reach {url} and no cached archive exists: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One downloadable engine build, computed fresh for every download request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    pub version: Version,
    pub url: String,
    pub archive_path: PathBuf,
    pub etag_path: PathBuf,
}

impl ArtifactDescriptor {
    /// Target the pinned version, else the newest permitted archive already cached.
    pub fn resolve(
        config: &Configuration,
        catalog: &VersionCatalog,
        cache_dir: &Path,
    ) -> Result<Self, DownloadError> {
        let version = match config.pinned() {
            Some(pinned) => pinned,
            None => {
                let cached = layout::scan_cached_versions(cache_dir, config.enable_snapshots);
                let newest = cached.into_iter().max().ok_or_else(|| DownloadError::NoUsableVersion {
                    cache_dir: cache_dir.to_path_buf(),
                })?;
                log::info!("No version pinned, using cached Vineflower {}", newest);
                newest
            }
        };
        Ok(Self::for_version(config, catalog, cache_dir, version))
    }

    pub fn for_version(
        config: &Configuration,
        catalog: &VersionCatalog,
        cache_dir: &Path,
        version: Version,
    ) -> Self {
        Self {
            url: layout::source_url(&config.repositories, catalog, &version),
            archive_path: layout::archive_path(cache_dir, &version),
            etag_path: layout::etag_path(cache_dir, &version),
            version,
        }
    }
}

/// A present, current archive on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArtifact {
    pub version: Version,
    pub path: PathBuf,
}
