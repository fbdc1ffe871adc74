#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

use vineflower_bridge::artifact::LocalArtifact;
use vineflower_bridge::bridge::{Capabilities, Engine, EngineError, EngineJob};
use vineflower_bridge::{Configuration, DecompilerContext, EngineLoader, Host, ProjectClasses, RepositoryUrls};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn repositories(base: &str) -> RepositoryUrls {
    RepositoryUrls {
        legacy_release: format!("{}/legacy/release/", base),
        legacy_snapshots: format!("{}/legacy/snapshots/", base),
        new_release: format!("{}/new/release/", base),
        new_snapshots: format!("{}/new/snapshots/", base),
    }
}

pub fn config_for(base: &str) -> Configuration {
    Configuration {
        repositories: repositories(base),
        ..Configuration::default()
    }
}

pub fn index_xml(versions: &[&str]) -> String {
    let entries: String = versions
        .iter()
        .map(|v| format!("      <version>{}</version>\n", v))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>org.vineflower</groupId>
  <artifactId>vineflower</artifactId>
  <versioning>
    <latest>{}</latest>
    <versions>
{}    </versions>
  </versioning>
</metadata>"#,
        versions.last().copied().unwrap_or_default(),
        entries
    )
}

/// Snapshot-line metadata whose newest build is `{base}-{timestamp}-{build}`.
pub fn snapshot_xml(base: &str, timestamp: &str, build: u32) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata modelVersion="1.1.0">
  <version>{base}-SNAPSHOT</version>
  <versioning>
    <snapshot>
      <timestamp>{timestamp}</timestamp>
      <buildNumber>{build}</buildNumber>
    </snapshot>
    <snapshotVersions>
      <snapshotVersion>
        <extension>jar</extension>
        <value>{base}-{timestamp}-{build}</value>
      </snapshotVersion>
      <snapshotVersion>
        <classifier>javadoc</classifier>
        <extension>jar</extension>
        <value>{base}-{timestamp}-{build}</value>
      </snapshotVersion>
    </snapshotVersions>
  </versioning>
</metadata>"#
    )
}

/// A zip archive containing the given entries.
pub fn jar_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, data) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// A minimal archive the capability probe accepts as an engine.
pub fn engine_jar_bytes() -> Vec<u8> {
    jar_bytes(&[(
        "org/jetbrains/java/decompiler/main/decompiler/ConsoleDecompiler.class",
        b"\xca\xfe\xba\xbe",
    )])
}

/// Write `Foo.class`, `Foo$Inner.class` and `Foobar.class` into `dir`.
pub fn write_class_group(dir: &Path) -> PathBuf {
    for name in ["Foo.class", "Foo$Inner.class", "Foobar.class"] {
        std::fs::write(dir.join(name), b"\xca\xfe\xba\xbe").unwrap();
    }
    dir.join("Foo.class")
}

/// What the fake engine saw on its last run.
#[derive(Debug, Default, Clone)]
pub struct Observed {
    pub sources: Vec<String>,
    pub options: BTreeMap<String, String>,
    pub library_bytes: Option<Vec<u8>>,
}

/// Engine stub that records its job, optionally looks up one library class,
/// and emits fixed text.
pub struct RecordingEngine {
    pub observed: Arc<Mutex<Observed>>,
    pub library_lookup: Option<&'static str>,
    pub fail_with: Option<fn() -> EngineError>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self {
            observed: Arc::new(Mutex::new(Observed::default())),
            library_lookup: None,
            fail_with: None,
        }
    }
}

impl Engine for RecordingEngine {
    fn decompile(&self, job: EngineJob<'_>) -> Result<(), EngineError> {
        let library_bytes = match (self.library_lookup, job.library) {
            (Some(name), Some(library)) => {
                // Engine-owned worker threads issue the lookups.
                std::thread::scope(|scope| scope.spawn(|| library.class_bytes(name)).join().unwrap())
            }
            _ => None,
        };
        *self.observed.lock().unwrap() = Observed {
            sources: job
                .sources
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                .collect(),
            options: job.options.clone(),
            library_bytes,
        };
        if let Some(fail) = self.fail_with {
            return Err(fail());
        }
        job.sink.save_class("Foo", "Foo.java", "public class Foo {\n}\n", Some(&[1u32, 1][..]));
        Ok(())
    }
}

/// Loader that wraps a shared engine stub and counts loads.
pub struct FakeLoader {
    pub engine: Arc<RecordingEngine>,
    pub loads: Arc<Mutex<usize>>,
}

impl FakeLoader {
    pub fn new(engine: RecordingEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            loads: Arc::new(Mutex::new(0)),
        }
    }
}

impl EngineLoader for FakeLoader {
    fn load(&self, artifact: &LocalArtifact, _config: &Configuration) -> anyhow::Result<DecompilerContext> {
        *self.loads.lock().unwrap() += 1;
        let capabilities = Capabilities {
            library_context: true,
            languages: false,
        };
        let engine: Arc<dyn Engine> = self.engine.clone();
        Ok(DecompilerContext::new(artifact.clone(), capabilities, engine, None))
    }
}

/// Project classes that only answer on the thread that owns host access.
pub struct OwnerThreadClasses {
    pub owner: ThreadId,
}

impl ProjectClasses for OwnerThreadClasses {
    fn find_class(&self, internal_name: &str) -> Option<Vec<u8>> {
        assert_eq!(std::thread::current().id(), self.owner, "read ran off the owning thread");
        (internal_name == "com/example/Dep").then(|| b"dep-bytes".to_vec())
    }
}

pub struct TestHost {
    pub write_access: bool,
    pub unit_test_mode: bool,
    pub classes: Option<Arc<dyn ProjectClasses>>,
    pub read_actions: Mutex<usize>,
    pub mappings: Mutex<Vec<Vec<u32>>>,
}

impl TestHost {
    pub fn new() -> Self {
        Self {
            write_access: false,
            unit_test_mode: false,
            classes: None,
            read_actions: Mutex::new(0),
            mappings: Mutex::new(Vec::new()),
        }
    }
}

impl Host for TestHost {
    fn holds_write_access(&self) -> bool {
        self.write_access
    }

    fn run_read_action(&self, action: &mut dyn FnMut()) {
        *self.read_actions.lock().unwrap() += 1;
        action();
    }

    fn is_unit_test_mode(&self) -> bool {
        self.unit_test_mode
    }

    fn project_classes(&self, _file: &Path) -> Option<Arc<dyn ProjectClasses>> {
        self.classes.clone()
    }

    fn attach_line_mapping(&self, _file: &Path, mapping: &[u32]) {
        self.mappings.lock().unwrap().push(mapping.to_vec());
    }

    fn original_text(&self, _file: &Path) -> String {
        "// original".to_string()
    }

    fn stub_text(&self, _file: &Path) -> String {
        "class Foo { /* compiled code */ }".to_string()
    }
}
