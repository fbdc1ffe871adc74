use super::catalog::VersionCatalog;
use super::fetcher::fetch_catalog;
use super::CatalogError;
use crate::config::RepositoryUrls;
use crate::progress::ProgressReporter;
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;

const CATALOG_FILENAME: &str = "catalog.json";

pub fn catalog_cache_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(CATALOG_FILENAME)
}

/// Fetch a fresh catalog, persisting it; on failure fall back to the last
/// persisted catalog (or an empty one) and hand back the fetch error.
pub async fn fetch_or_cached(
    client: &reqwest::Client,
    repositories: &RepositoryUrls,
    cache_dir: &Path,
    reporter: &dyn ProgressReporter,
) -> (VersionCatalog, Option<CatalogError>) {
    let path = catalog_cache_path(cache_dir);
    match fetch_catalog(client, repositories, reporter).await {
        Ok(catalog) => {
            if let Err(e) = save_catalog(&path, &catalog).await {
                log::warn!("Failed to save catalog to cache: {:#}", e);
            }
            (catalog, None)
        }
        Err(e) => {
            log::error!("Failed to fetch Vineflower versions: {}", e);
            reporter.done(false, Some(&e.to_string()));
            let fallback = match load_cached_catalog(&path).await {
                Ok(Some(catalog)) => {
                    log::warn!(
                        "Falling back to cached catalog (age: {} hours)",
                        catalog
                            .fetched_at()
                            .map(|at| (Utc::now() - at).num_hours())
                            .unwrap_or(-1)
                    );
                    catalog
                }
                Ok(None) => {
                    log::info!("No cached catalog found, continuing with an empty one");
                    VersionCatalog::empty()
                }
                Err(cache_err) => {
                    log::error!("Failed to load cached catalog: {:#}", cache_err);
                    VersionCatalog::empty()
                }
            };
            (fallback, Some(e))
        }
    }
}

/// Load a persisted catalog. `Ok(None)` when none has been saved yet.
pub async fn load_cached_catalog(path: &Path) -> Result<Option<VersionCatalog>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)
        .await
        .context("Failed to read catalog file")?;
    let catalog = serde_json::from_str(&contents).context("Failed to parse catalog JSON")?;
    Ok(Some(catalog))
}

pub async fn save_catalog(path: &Path, catalog: &VersionCatalog) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .context("Failed to create catalog directory")?;
    }
    let json = serde_json::to_string_pretty(catalog).context("Failed to serialize catalog to JSON")?;
    fs::write(path, json)
        .await
        .context("Failed to write catalog file")?;
    log::debug!("Saved catalog to {:?}", path);
    Ok(())
}
