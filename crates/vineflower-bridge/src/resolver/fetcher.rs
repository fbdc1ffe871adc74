use super::catalog::{Repository, VersionCatalog};
use super::metadata::{self, ArtifactIndex, SnapshotBuilds};
use super::CatalogError;
use crate::config::RepositoryUrls;
use crate::progress::ProgressReporter;
use crate::utils::Version;
use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::{Client, StatusCode};

/// Width of the worker pool for per-line snapshot lookups.
pub const SNAPSHOT_LOOKUP_CONCURRENCY: usize = 4;

const METADATA_FILE: &str = "maven-metadata.xml";

/// Fetch and assemble the catalog from all four repository roots.
pub async fn fetch_catalog(
    client: &Client,
    repositories: &RepositoryUrls,
    reporter: &dyn ProgressReporter,
) -> Result<VersionCatalog, CatalogError> {
    log::info!("Fetching Vineflower versions from all repositories...");
    reporter.start_step("Fetching Vineflower versions");

    let (new_releases, legacy_releases, new_snapshots, legacy_snapshots) = futures::try_join!(
        fetch_index(client, &repositories.new_release),
        fetch_index(client, &repositories.legacy_release),
        fetch_index(client, &repositories.new_snapshots),
        fetch_index(client, &repositories.legacy_snapshots),
    )?;

    // Lines republished under the new coordinates shadow their legacy copies.
    let mut jobs: Vec<(Repository, &str, String)> = new_snapshots
        .versions
        .iter()
        .map(|line| (Repository::New, repositories.new_snapshots.as_str(), line.clone()))
        .collect();
    jobs.extend(
        legacy_snapshots
            .versions
            .iter()
            .filter(|line| !new_snapshots.versions.contains(line))
            .map(|line| (Repository::Legacy, repositories.legacy_snapshots.as_str(), line.clone())),
    );

    reporter.set_message(&format!("Resolving {} snapshot lines", jobs.len()));
    let lookups = jobs
        .into_iter()
        .map(|(repo, base, line)| async move {
            fetch_snapshot_line(client, base, &line)
                .await
                .map(|builds| (repo, builds))
        })
        .collect::<Vec<_>>();
    let resolved: Vec<(Repository, Option<SnapshotBuilds>)> = stream::iter(lookups)
        .buffer_unordered(SNAPSHOT_LOOKUP_CONCURRENCY)
        .try_collect()
        .await?;

    let mut new_snapshot_versions = Vec::new();
    let mut legacy_snapshot_versions = Vec::new();
    for (repo, builds) in resolved {
        let Some(builds) = builds else { continue };
        let target = match repo {
            Repository::New => &mut new_snapshot_versions,
            Repository::Legacy => &mut legacy_snapshot_versions,
        };
        target.extend(snapshot_versions(&builds));
    }

    let catalog = VersionCatalog::from_lists(
        parse_versions(&new_releases),
        parse_versions(&legacy_releases),
        new_snapshot_versions,
        legacy_snapshot_versions,
    )
    .stamped(Utc::now());

    log::info!(
        "Vineflower catalog fetched: {} releases, {} snapshots (latest release {:?}, latest snapshot {:?})",
        catalog.releases().count(),
        catalog.snapshots().count(),
        catalog.latest_release().map(|v| v.to_string()),
        catalog.latest_snapshot().map(|v| v.to_string()),
    );
    reporter.done(true, None);
    Ok(catalog)
}

async fn fetch_index(client: &Client, base: &str) -> Result<ArtifactIndex, CatalogError> {
    let url = format!("{}{}", base, METADATA_FILE);
    let Some(xml) = get_metadata(client, &url).await? else {
        log::warn!("Repository index not found, treating as empty: {}", url);
        return Ok(ArtifactIndex::default());
    };
    let index = metadata::parse_artifact_index(&xml)
        .map_err(|source| CatalogError::Metadata { url: url.clone(), source })?;
    log::debug!(
        "{}: {} versions (declared latest {:?})",
        url,
        index.versions.len(),
        index.latest
    );
    Ok(index)
}

async fn fetch_snapshot_line(
    client: &Client,
    base: &str,
    line: &str,
) -> Result<Option<SnapshotBuilds>, CatalogError> {
    let url = format!("{}{}/{}", base, line, METADATA_FILE);
    let Some(xml) = get_metadata(client, &url).await? else {
        log::warn!("Snapshot line {} has no metadata, skipping: {}", line, url);
        return Ok(None);
    };
    metadata::parse_snapshot_builds(line, &xml)
        .map(Some)
        .map_err(|source| CatalogError::Metadata { url, source })
}

/// GET a metadata document. `Ok(None)` means the server answered 404.
async fn get_metadata(client: &Client, url: &str) -> Result<Option<String>, CatalogError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| CatalogError::Transport { url: url.to_string(), source })?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !status.is_success() {
        return Err(CatalogError::Status { url: url.to_string(), status });
    }

    response
        .text()
        .await
        .map(Some)
        .map_err(|source| CatalogError::Transport { url: url.to_string(), source })
}

fn parse_versions(index: &ArtifactIndex) -> Vec<Version> {
    index
        .versions
        .iter()
        .filter_map(|text| {
            let parsed = Version::parse(text);
            if parsed.is_none() {
                log::debug!("Ignoring unparseable version: {}", text);
            }
            parsed
        })
        .collect()
}

fn snapshot_versions(builds: &SnapshotBuilds) -> Vec<Version> {
    let mut versions: Vec<Version> = builds.builds.iter().filter_map(|b| Version::parse(b)).collect();
    if let Some(latest) = Version::parse(&builds.latest) {
        if !versions.contains(&latest) {
            versions.push(latest);
        }
    }
    versions
}
