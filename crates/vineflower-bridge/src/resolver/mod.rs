//! Engine version discovery across the legacy and new repositories.

pub mod cache;
pub mod catalog;
pub mod fetcher;
pub mod metadata;

pub use catalog::{Channel, Repository, VersionCatalog};
pub use fetcher::{fetch_catalog, SNAPSHOT_LOOKUP_CONCURRENCY};

use crate::config::Configuration;
use crate::utils::Version;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
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
    #[error("Invalid repository metadata at {url}: {source}")]
    Metadata {
        url: String,
        #[source]
        source: metadata::MetadataError,
    },
}

/// Re-pin to the newest permitted version when nothing is pinned or
/// auto-update is on. Returns the new pin if it changed.
pub fn apply_pin_policy(config: &mut Configuration, catalog: &VersionCatalog) -> Option<Version> {
    if config.pinned().is_some() && !config.auto_update {
        return None;
    }
    let preferred = catalog.preferred(config.enable_snapshots)?.clone();
    if config.pinned().as_ref() == Some(&preferred) {
        return None;
    }
    log::info!(
        "Pinning Vineflower {} (was {:?})",
        preferred,
        config.pinned_version
    );
    config.set_pinned(Some(&preferred));
    Some(preferred)
}
