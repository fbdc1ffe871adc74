use super::{ArtifactDescriptor, DownloadError, LocalArtifact};
use crate::config::Configuration;
use crate::progress::ProgressReporter;
use crate::resolver::VersionCatalog;
use futures::StreamExt;
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::{Client, StatusCode};
use std::path::Path;
use tempfile::TempPath;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

/// Resolve the target version and make sure its archive is present and current.
pub async fn ensure_artifact(
    client: &Client,
    config: &Configuration,
    catalog: &VersionCatalog,
    cache_dir: &Path,
    reporter: &dyn ProgressReporter,
) -> Result<LocalArtifact, DownloadError> {
    let descriptor = ArtifactDescriptor::resolve(config, catalog, cache_dir)?;
    fetch_artifact(client, &descriptor, reporter).await
}

/// Conditionally fetch one archive.
///
/// The stored entity tag is sent as `If-None-Match` when both the archive
/// and its tag file exist. An unreachable host with a cached archive, or a
/// `304`, keeps the cached file.
pub async fn fetch_artifact(
    client: &Client,
    descriptor: &ArtifactDescriptor,
    reporter: &dyn ProgressReporter,
) -> Result<LocalArtifact, DownloadError> {
    let url = descriptor.url.as_str();
    let archive = descriptor.archive_path.as_path();
    let have_archive = archive.is_file();

    log::info!("Ensuring Vineflower {} from {}", descriptor.version, url);
    reporter.start_step(&format!("Downloading Vineflower {}", descriptor.version));

    let mut request = client.get(url);
    if have_archive {
        if let Some(etag) = read_etag(&descriptor.etag_path).await {
            log::debug!("Sending If-None-Match: {}", etag);
            request = request.header(IF_NONE_MATCH, etag);
        }
    }

    let local = LocalArtifact {
        version: descriptor.version.clone(),
        path: archive.to_path_buf(),
    };

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) if e.is_connect() && have_archive => {
            log::warn!(
                "Cannot reach {} ({}), using cached archive {:?}",
                url,
                e,
                archive
            );
            reporter.done(true, Some("Using cached archive"));
            return Ok(local);
        }
        Err(e) if e.is_connect() => {
            return Err(DownloadError::Unreachable { url: url.to_string(), source: e });
        }
        Err(e) => {
            return Err(DownloadError::Transport { url: url.to_string(), source: e });
        }
    };

    let status = response.status();
    if status == StatusCode::NOT_MODIFIED {
        log::info!("Vineflower {} is up to date", descriptor.version);
        reporter.done(true, Some("Up to date"));
        return Ok(local);
    }
    if status != StatusCode::OK {
        log::error!("Download of {} failed with HTTP {}", url, status);
        reporter.done(false, Some(&format!("HTTP {}", status)));
        return Err(DownloadError::Status { url: url.to_string(), status });
    }

    let etag = response
        .headers()
        .get(ETAG)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    stream_to_path(response, url, archive, reporter).await?;

    match etag {
        Some(etag) => fs::write(&descriptor.etag_path, etag.as_bytes())
            .await
            .map_err(|source| io_error(&descriptor.etag_path, source))?,
        // A tag from an older download would no longer describe this file.
        None => remove_if_exists(&descriptor.etag_path).await?,
    }

    log::info!("Downloaded Vineflower {} to {:?}", descriptor.version, archive);
    reporter.done(true, None);
    Ok(local)
}

async fn stream_to_path(
    response: reqwest::Response,
    url: &str,
    path: &Path,
    reporter: &dyn ProgressReporter,
) -> Result<(), DownloadError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|source| io_error(parent, source))?;
    }

    // Every download gets its own temporary file, renamed over the target
    // once complete.
    let (file, tmp_path) = temp_beside(path)?;
    let mut file = File::from_std(file);

    let total_size = response.content_length();
    let mut downloaded: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| DownloadError::Transport { url: url.to_string(), source })?;
        file.write_all(&chunk)
            .await
            .map_err(|source| io_error(&tmp_path, source))?;
        downloaded += chunk.len() as u64;
        reporter.update_bytes(downloaded, total_size);
    }
    file.flush().await.map_err(|source| io_error(&tmp_path, source))?;
    drop(file);

    tmp_path
        .persist(path)
        .map_err(|e| io_error(path, e.error))?;
    log::debug!("Wrote {} bytes to {:?}", downloaded, path);
    Ok(())
}

/// A uniquely named `<target>.<random>.part` file in the target's directory,
/// removed again when the returned path is dropped without being persisted.
fn temp_beside(path: &Path) -> Result<(std::fs::File, TempPath), DownloadError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let prefix = format!(
        "{}.",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("download")
    );
    let file = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(|source| io_error(dir, source))?;
    Ok(file.into_parts())
}

async fn read_etag(path: &Path) -> Option<String> {
    match fs::read_to_string(path).await {
        Ok(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Err(_) => None,
    }
}

async fn remove_if_exists(path: &Path) -> Result<(), DownloadError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(io_error(path, source)),
    }
}

fn io_error(path: &Path, source: std::io::Error) -> DownloadError {
    DownloadError::Io {
        path: path.to_path_buf(),
        source,
    }
}
