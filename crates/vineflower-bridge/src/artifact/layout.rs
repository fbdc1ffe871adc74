//! On-disk cache layout and remote locations of engine archives.

use crate::config::RepositoryUrls;
use crate::resolver::{Channel, Repository, VersionCatalog};
use crate::utils::Version;
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "vineflower-";
const ARCHIVE_EXTENSION: &str = "jar";
const ETAG_EXTENSION: &str = "etag";

pub fn archive_path(cache_dir: &Path, version: &Version) -> PathBuf {
    cache_dir.join(format!("{}{}.{}", FILE_PREFIX, version, ARCHIVE_EXTENSION))
}

pub fn etag_path(cache_dir: &Path, version: &Version) -> PathBuf {
    cache_dir.join(format!("{}{}.{}", FILE_PREFIX, version, ETAG_EXTENSION))
}

/// Versions with an archive already in `cache_dir`, ascending.
pub fn scan_cached_versions(cache_dir: &Path, include_snapshots: bool) -> Vec<Version> {
    let entries = match std::fs::read_dir(cache_dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("Cannot scan artifact cache {:?}: {}", cache_dir, e);
            return Vec::new();
        }
    };

    let mut versions: Vec<Version> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| {
            let name = entry.file_name();
            let name = name.to_str()?;
            let version = name
                .strip_prefix(FILE_PREFIX)?
                .strip_suffix(ARCHIVE_EXTENSION)?
                .strip_suffix('.')?;
            Version::parse(version)
        })
        .filter(|version| include_snapshots || !version.is_snapshot())
        .collect();
    versions.sort();
    versions
}

/// Remote URL of `version`'s archive. Versions unknown to the catalog are
/// looked up as legacy snapshots, the only layout not listed exhaustively.
pub fn source_url(repositories: &RepositoryUrls, catalog: &VersionCatalog, version: &Version) -> String {
    match catalog.locate(version) {
        Some((Channel::Release, Repository::New)) => format!(
            "{}{}/vineflower-{}.jar",
            repositories.new_release, version, version
        ),
        Some((Channel::Release, Repository::Legacy)) => format!(
            "{}{}/quiltflower-{}.jar",
            repositories.legacy_release, version, version
        ),
        Some((Channel::Snapshot, Repository::New)) => format!(
            "{}{}/vineflower-{}.jar",
            repositories.new_snapshots,
            version.snapshot_line(),
            version
        ),
        Some((Channel::Snapshot, Repository::Legacy)) | None => format!(
            "{}{}/quiltflower-{}.jar",
            repositories.legacy_snapshots,
            version.snapshot_line(),
            version
        ),
    }
}
