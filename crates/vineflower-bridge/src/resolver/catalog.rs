use crate::utils::Version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Release,
    Snapshot,
}

/// Which hosting generation a version was published to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Repository {
    /// Quilt Maven, artifact `quiltflower`
    Legacy,
    /// Sonatype, artifact `vineflower`
    New,
}

/// Snapshot of both repositories' published versions.
///
/// Lists are sorted ascending and deduplicated; a version published to both
/// generations is kept only in the new partition. `latest_*` is always the
/// maximum of its channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "CatalogRecord")]
pub struct VersionCatalog {
    latest_release: Option<Version>,
    latest_snapshot: Option<Version>,
    new_releases: Vec<Version>,
    legacy_releases: Vec<Version>,
    new_snapshots: Vec<Version>,
    legacy_snapshots: Vec<Version>,
    fetched_at: Option<DateTime<Utc>>,
}

/// Unchecked on-disk form; normalized on the way in.
#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CatalogRecord {
    new_releases: Vec<Version>,
    legacy_releases: Vec<Version>,
    new_snapshots: Vec<Version>,
    legacy_snapshots: Vec<Version>,
    fetched_at: Option<DateTime<Utc>>,
}

impl From<CatalogRecord> for VersionCatalog {
    fn from(record: CatalogRecord) -> Self {
        let mut catalog = VersionCatalog::from_lists(
            record.new_releases,
            record.legacy_releases,
            record.new_snapshots,
            record.legacy_snapshots,
        );
        catalog.fetched_at = record.fetched_at;
        catalog
    }
}

fn normalize(mut versions: Vec<Version>) -> Vec<Version> {
    versions.sort();
    versions.dedup();
    versions
}

impl VersionCatalog {
    pub fn empty() -> Self {
        Self::from_lists(Vec::new(), Vec::new(), Vec::new(), Vec::new())
    }

    pub fn from_lists(
        new_releases: Vec<Version>,
        legacy_releases: Vec<Version>,
        new_snapshots: Vec<Version>,
        legacy_snapshots: Vec<Version>,
    ) -> Self {
        let new_releases = normalize(new_releases);
        let new_snapshots = normalize(new_snapshots);
        let mut legacy_releases = normalize(legacy_releases);
        let mut legacy_snapshots = normalize(legacy_snapshots);
        legacy_releases.retain(|v| new_releases.binary_search(v).is_err());
        legacy_snapshots.retain(|v| new_snapshots.binary_search(v).is_err());

        let latest_release = new_releases.last().max(legacy_releases.last()).cloned();
        let latest_snapshot = new_snapshots.last().max(legacy_snapshots.last()).cloned();

        Self {
            latest_release,
            latest_snapshot,
            new_releases,
            legacy_releases,
            new_snapshots,
            legacy_snapshots,
            fetched_at: None,
        }
    }

    pub(crate) fn stamped(mut self, at: DateTime<Utc>) -> Self {
        self.fetched_at = Some(at);
        self
    }

    pub fn latest_release(&self) -> Option<&Version> {
        self.latest_release.as_ref()
    }

    pub fn latest_snapshot(&self) -> Option<&Version> {
        self.latest_snapshot.as_ref()
    }

    pub fn releases(&self) -> impl Iterator<Item = &Version> {
        self.new_releases.iter().chain(self.legacy_releases.iter())
    }

    pub fn snapshots(&self) -> impl Iterator<Item = &Version> {
        self.new_snapshots.iter().chain(self.legacy_snapshots.iter())
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    pub fn is_empty(&self) -> bool {
        self.latest_release.is_none() && self.latest_snapshot.is_none()
    }

    /// Where a version is published: release lists first, then snapshot lists.
    pub fn locate(&self, version: &Version) -> Option<(Channel, Repository)> {
        let searches = [
            (&self.new_releases, Channel::Release, Repository::New),
            (&self.legacy_releases, Channel::Release, Repository::Legacy),
            (&self.new_snapshots, Channel::Snapshot, Repository::New),
            (&self.legacy_snapshots, Channel::Snapshot, Repository::Legacy),
        ];
        searches
            .into_iter()
            .find(|(list, _, _)| list.binary_search(version).is_ok())
            .map(|(_, channel, repo)| (channel, repo))
    }

    /// The newest version among the permitted channels.
    pub fn preferred(&self, include_snapshots: bool) -> Option<&Version> {
        let release = self.latest_release.as_ref();
        if include_snapshots {
            release.max(self.latest_snapshot.as_ref())
        } else {
            release
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(text: &str) -> Version {
        Version::parse(text).unwrap()
    }

    fn sample() -> VersionCatalog {
        VersionCatalog::from_lists(
            vec![v("1.10.1"), v("1.10.0"), v("1.10.0")],
            vec![v("1.8.0"), v("1.9.0"), v("1.10.0")],
            vec![v("1.11.0-20240505.053810-63")],
            vec![v("1.9.1-20230101.000000-1"), v("1.11.0-20240505.053810-63")],
        )
    }

    #[test]
    fn test_lists_are_sorted_and_deduplicated_across_repositories() {
        let catalog = sample();
        let releases: Vec<String> = catalog.releases().map(|v| v.to_string()).collect();
        assert_eq!(releases, vec!["1.10.0", "1.10.1", "1.8.0", "1.9.0"]);
        assert_eq!(catalog.snapshots().count(), 2);
    }

    #[test]
    fn test_latest_is_member_and_maximum() {
        let catalog = sample();
        let latest = catalog.latest_release().unwrap();
        assert_eq!(latest, &v("1.10.1"));
        assert!(catalog.releases().any(|r| r == latest));
        assert!(catalog.releases().all(|r| r <= latest));

        let snapshot = catalog.latest_snapshot().unwrap();
        assert!(catalog.snapshots().any(|s| s == snapshot));
    }

    #[test]
    fn test_preferred_respects_channels() {
        let catalog = sample();
        assert_eq!(catalog.preferred(false), Some(&v("1.10.1")));
        assert_eq!(catalog.preferred(true), Some(&v("1.11.0-20240505.053810-63")));

        let releases_only = VersionCatalog::from_lists(
            vec![v("2.0.0")],
            vec![],
            vec![v("1.11.0-20240505.053810-63")],
            vec![],
        );
        assert_eq!(releases_only.preferred(true), Some(&v("2.0.0")));
    }

    #[test]
    fn test_locate_prefers_release_lists() {
        let catalog = sample();
        assert_eq!(catalog.locate(&v("1.10.0")), Some((Channel::Release, Repository::New)));
        assert_eq!(catalog.locate(&v("1.8.0")), Some((Channel::Release, Repository::Legacy)));
        assert_eq!(
            catalog.locate(&v("1.9.1-20230101.000000-1")),
            Some((Channel::Snapshot, Repository::Legacy))
        );
        assert_eq!(catalog.locate(&v("0.1.0")), None);
    }

    #[test]
    fn test_persisted_form_is_normalized_on_load() {
        let json = r#"{"newReleases": ["1.10.1", "1.9.0", "1.10.1"], "legacyReleases": ["1.9.0"], "latestRelease": "0.0.1"}"#;
        let catalog: VersionCatalog = serde_json::from_str(json).unwrap();
        assert_eq!(catalog.latest_release(), Some(&v("1.10.1")));
        assert_eq!(catalog.releases().count(), 2);
        assert!(catalog.latest_snapshot().is_none());
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = VersionCatalog::empty();
        assert!(catalog.is_empty());
        assert!(catalog.preferred(true).is_none());
    }
}
