//! `maven-metadata.xml` documents.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct MavenMetadataXml {
    versioning: Option<VersioningXml>,
}

#[derive(Debug, Deserialize)]
struct VersioningXml {
    latest: Option<String>,
    versions: Option<VersionListXml>,
    snapshot: Option<SnapshotXml>,
    #[serde(rename = "snapshotVersions")]
    snapshot_versions: Option<SnapshotVersionsXml>,
}

#[derive(Debug, Deserialize)]
struct VersionListXml {
    #[serde(default)]
    version: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SnapshotXml {
    timestamp: Option<String>,
    #[serde(rename = "buildNumber")]
    build_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SnapshotVersionsXml {
    #[serde(default, rename = "snapshotVersion")]
    snapshot_version: Vec<SnapshotVersionXml>,
}

#[derive(Debug, Deserialize)]
struct SnapshotVersionXml {
    extension: Option<String>,
    classifier: Option<String>,
    value: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("root element is {0:?}, expected \"metadata\"")]
    WrongRoot(Option<String>),
    #[error("missing <{0}> element")]
    Missing(&'static str),
    #[error("malformed XML: {0}")]
    Xml(#[from] serde_xml_rs::Error),
}

/// The artifact-level index: `latest` plus every published version string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactIndex {
    pub latest: Option<String>,
    pub versions: Vec<String>,
}

/// The snapshot-line index resolved to concrete timestamped builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotBuilds {
    /// e.g. `1.10.0-SNAPSHOT`
    pub line: String,
    /// The newest build, e.g. `1.10.0-20240505.053810-63`
    pub latest: String,
    /// Every plain-jar build identifier listed for the line.
    pub builds: Vec<String>,
}

fn parse_document(xml: &str) -> Result<VersioningXml, MetadataError> {
    let root = root_element_name(xml);
    if root != Some("metadata") {
        return Err(MetadataError::WrongRoot(root.map(str::to_string)));
    }
    let doc: MavenMetadataXml = serde_xml_rs::from_str(xml)?;
    doc.versioning.ok_or(MetadataError::Missing("versioning"))
}

pub fn parse_artifact_index(xml: &str) -> Result<ArtifactIndex, MetadataError> {
    let versioning = parse_document(xml)?;
    Ok(ArtifactIndex {
        latest: versioning.latest.map(|s| s.trim().to_string()),
        versions: versioning
            .versions
            .map(|v| v.version.into_iter().map(|s| s.trim().to_string()).collect())
            .unwrap_or_default(),
    })
}

pub fn parse_snapshot_builds(line: &str, xml: &str) -> Result<SnapshotBuilds, MetadataError> {
    let versioning = parse_document(xml)?;
    let snapshot = versioning.snapshot.ok_or(MetadataError::Missing("snapshot"))?;
    let timestamp = snapshot.timestamp.ok_or(MetadataError::Missing("timestamp"))?;
    let build_number = snapshot
        .build_number
        .ok_or(MetadataError::Missing("buildNumber"))?;

    let builds = versioning
        .snapshot_versions
        .map(|sv| {
            sv.snapshot_version
                .into_iter()
                .filter(|entry| {
                    entry.extension.as_deref().map(str::trim) == Some("jar")
                        && entry.classifier.as_deref().map_or(true, |c| c.trim().is_empty())
                })
                .filter_map(|entry| entry.value.map(|v| v.trim().to_string()))
                .collect()
        })
        .unwrap_or_default();

    Ok(SnapshotBuilds {
        line: line.to_string(),
        latest: format!(
            "{}-{}-{}",
            line.trim_end_matches("-SNAPSHOT"),
            timestamp.trim(),
            build_number.trim()
        ),
        builds,
    })
}

/// Name of the first element, skipping the prolog, comments and doctype.
fn root_element_name(xml: &str) -> Option<&str> {
    let mut rest = xml.trim_start_matches('\u{feff}');
    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix("<?") {
            rest = &after[after.find("?>")? + 2..];
        } else if let Some(after) = rest.strip_prefix("<!--") {
            rest = &after[after.find("-->")? + 3..];
        } else if let Some(after) = rest.strip_prefix("<!") {
            rest = &after[after.find('>')? + 1..];
        } else if let Some(after) = rest.strip_prefix('<') {
            let end = after
                .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
                .unwrap_or(after.len());
            return Some(&after[..end]);
        } else {
            return None;
        }
    }
}
