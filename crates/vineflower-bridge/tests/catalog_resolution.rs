mod common;

use common::{config_for, index_xml, init_logger, repositories, snapshot_xml};
use vineflower_bridge::resolver::{self, cache, fetch_catalog, Channel, Repository};
use vineflower_bridge::{CatalogError, LogProgressReporter, SilentProgressReporter, Version};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_xml(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn missing_repository_index_is_an_empty_list() {
    init_logger();
    let server = MockServer::start().await;
    mount_xml(
        &server,
        "/new/release/maven-metadata.xml",
        index_xml(&["1.9.3", "1.10.0", "1.10.1"]),
    )
    .await;
    // Every other index answers 404.

    let client = reqwest::Client::new();
    let catalog = fetch_catalog(&client, &repositories(&server.uri()), &SilentProgressReporter)
        .await
        .expect("catalog with one healthy repository");

    assert_eq!(catalog.releases().count(), 3);
    assert_eq!(catalog.snapshots().count(), 0);
    assert_eq!(catalog.latest_release(), Some(&Version::new(1, 10, 1)));
    assert!(catalog.fetched_at().is_some());
}

#[tokio::test]
async fn snapshot_lines_resolve_to_timestamped_builds() {
    init_logger();
    let server = MockServer::start().await;
    mount_xml(&server, "/new/release/maven-metadata.xml", index_xml(&["1.10.1"])).await;
    mount_xml(&server, "/legacy/release/maven-metadata.xml", index_xml(&["1.8.0", "1.9.0"])).await;
    mount_xml(
        &server,
        "/new/snapshots/maven-metadata.xml",
        index_xml(&["1.11.0-SNAPSHOT"]),
    )
    .await;
    mount_xml(
        &server,
        "/new/snapshots/1.11.0-SNAPSHOT/maven-metadata.xml",
        snapshot_xml("1.11.0", "20240505.053810", 63),
    )
    .await;
    mount_xml(
        &server,
        "/legacy/snapshots/maven-metadata.xml",
        index_xml(&["1.9.1-SNAPSHOT", "1.9.2-SNAPSHOT"]),
    )
    .await;
    mount_xml(
        &server,
        "/legacy/snapshots/1.9.1-SNAPSHOT/maven-metadata.xml",
        snapshot_xml("1.9.1", "20230101.101010", 4),
    )
    .await;
    // 1.9.2-SNAPSHOT has no line metadata and is skipped.

    let client = reqwest::Client::new();
    let catalog = fetch_catalog(&client, &repositories(&server.uri()), &LogProgressReporter)
        .await
        .unwrap();

    let new_snapshot = Version::parse("1.11.0-20240505.053810-63").unwrap();
    let legacy_snapshot = Version::parse("1.9.1-20230101.101010-4").unwrap();
    assert_eq!(catalog.latest_snapshot(), Some(&new_snapshot));
    assert_eq!(catalog.snapshots().count(), 2);
    assert_eq!(catalog.locate(&new_snapshot), Some((Channel::Snapshot, Repository::New)));
    assert_eq!(catalog.locate(&legacy_snapshot), Some((Channel::Snapshot, Repository::Legacy)));
    assert_eq!(
        catalog.locate(&Version::new(1, 8, 0)),
        Some((Channel::Release, Repository::Legacy))
    );
}

#[tokio::test]
async fn auto_update_pins_the_newest_permitted_version() {
    init_logger();
    let server = MockServer::start().await;
    mount_xml(&server, "/new/release/maven-metadata.xml", index_xml(&["1.10.0", "1.10.1"])).await;
    mount_xml(
        &server,
        "/new/snapshots/maven-metadata.xml",
        index_xml(&["1.11.0-SNAPSHOT"]),
    )
    .await;
    mount_xml(
        &server,
        "/new/snapshots/1.11.0-SNAPSHOT/maven-metadata.xml",
        snapshot_xml("1.11.0", "20240505.053810", 63),
    )
    .await;

    let client = reqwest::Client::new();
    let mut config = config_for(&server.uri());
    let catalog = fetch_catalog(&client, &config.repositories, &SilentProgressReporter)
        .await
        .unwrap();

    assert_eq!(resolver::apply_pin_policy(&mut config, &catalog), Some(Version::new(1, 10, 1)));
    assert_eq!(config.pinned_version.as_deref(), Some("1.10.1"));

    config.enable_snapshots = true;
    let snapshot = Version::parse("1.11.0-20240505.053810-63").unwrap();
    assert_eq!(resolver::apply_pin_policy(&mut config, &catalog), Some(snapshot));

    config.auto_update = false;
    config.enable_snapshots = false;
    assert_eq!(resolver::apply_pin_policy(&mut config, &catalog), None);
    assert_eq!(config.pinned_version.as_deref(), Some("1.11.0-20240505.053810-63"));
}

#[tokio::test]
async fn failed_fetch_falls_back_to_the_persisted_catalog() {
    init_logger();
    let cache_dir = tempfile::tempdir().unwrap();
    let client = reqwest::Client::new();

    let healthy = MockServer::start().await;
    mount_xml(&healthy, "/new/release/maven-metadata.xml", index_xml(&["1.10.1"])).await;
    let (catalog, error) =
        cache::fetch_or_cached(&client, &repositories(&healthy.uri()), cache_dir.path(), &SilentProgressReporter)
            .await;
    assert!(error.is_none());
    assert!(cache::catalog_cache_path(cache_dir.path()).is_file());

    let broken = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&broken)
        .await;
    let (fallback, error) =
        cache::fetch_or_cached(&client, &repositories(&broken.uri()), cache_dir.path(), &SilentProgressReporter)
            .await;

    assert!(matches!(error, Some(CatalogError::Status { .. })));
    assert_eq!(fallback.latest_release(), catalog.latest_release());
}

#[tokio::test]
async fn malformed_index_fails_the_fetch() {
    init_logger();
    let server = MockServer::start().await;
    mount_xml(&server, "/new/release/maven-metadata.xml", "<html>maintenance</html>".to_string()).await;

    let client = reqwest::Client::new();
    let err = fetch_catalog(&client, &repositories(&server.uri()), &SilentProgressReporter)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Metadata { .. }), "{}", err);
}
