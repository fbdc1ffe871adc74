//! Persisted user settings and fixed endpoints.
//!
//! The settings surface owns mutation; everything else reads a fresh
//! [`Configuration`] snapshot per operation so edits apply without restart.

use crate::utils::Version;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

pub const LEGACY_RELEASE_BASE_URL: &str =
    "https://maven.quiltmc.org/repository/release/org/quiltmc/quiltflower/";
pub const LEGACY_SNAPSHOTS_BASE_URL: &str =
    "https://maven.quiltmc.org/repository/snapshot/org/quiltmc/quiltflower/";
pub const NEW_RELEASE_BASE_URL: &str =
    "https://s01.oss.sonatype.org/service/local/repositories/releases/content/org/vineflower/vineflower/";
pub const NEW_SNAPSHOTS_BASE_URL: &str =
    "https://s01.oss.sonatype.org/service/local/repositories/snapshots/content/org/vineflower/vineflower/";

pub const USER_AGENT: &str = concat!("vineflower-bridge/", env!("CARGO_PKG_VERSION"));

pub const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Repository roots for both hosting generations of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RepositoryUrls {
    pub legacy_release: String,
    pub legacy_snapshots: String,
    pub new_release: String,
    pub new_snapshots: String,
}

impl Default for RepositoryUrls {
    fn default() -> Self {
        Self {
            legacy_release: LEGACY_RELEASE_BASE_URL.to_string(),
            legacy_snapshots: LEGACY_SNAPSHOTS_BASE_URL.to_string(),
            new_release: NEW_RELEASE_BASE_URL.to_string(),
            new_snapshots: NEW_SNAPSHOTS_BASE_URL.to_string(),
        }
    }
}

impl RepositoryUrls {
    /// Every URL must parse and end in `/` so artifact paths can be appended.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("legacyRelease", &self.legacy_release),
            ("legacySnapshots", &self.legacy_snapshots),
            ("newRelease", &self.new_release),
            ("newSnapshots", &self.new_snapshots),
        ] {
            url::Url::parse(value).with_context(|| format!("Invalid {} URL: {}", name, value))?;
            if !value.ends_with('/') {
                anyhow::bail!("{} URL must end with '/': {}", name, value);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    pub enabled: bool,
    pub auto_update: bool,
    pub enable_snapshots: bool,
    /// Raw pinned version; unparseable text behaves like no pin.
    pub pinned_version: Option<String>,
    pub repositories: RepositoryUrls,
    /// Engine preference overrides, keyed by the engine's short option names.
    pub preferences: BTreeMap<String, String>,
    pub java_path: Option<PathBuf>,
    pub indent_size: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_update: true,
            enable_snapshots: false,
            pinned_version: None,
            repositories: RepositoryUrls::default(),
            preferences: BTreeMap::new(),
            java_path: None,
            indent_size: 4,
        }
    }
}

impl Configuration {
    pub fn pinned(&self) -> Option<Version> {
        self.pinned_version.as_deref().and_then(Version::parse)
    }

    pub fn set_pinned(&mut self, version: Option<&Version>) {
        self.pinned_version = version.map(|v| v.to_string());
    }
}

/// Default location of the archive cache (`<config dir>/vineflower/jars`).
pub fn default_cache_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("org", "vineflower", "vineflower-bridge")
        .context("Could not determine the user configuration directory")?;
    Ok(dirs.config_dir().join("vineflower").join("jars"))
}

pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .context("Failed to create HTTP client")
}

/// JSON-backed settings store. Without a path it keeps settings in memory only.
#[derive(Debug)]
pub struct SettingsFile {
    path: Option<PathBuf>,
    current: RwLock<Configuration>,
}

impl SettingsFile {
    pub fn in_memory(config: Configuration) -> Self {
        Self {
            path: None,
            current: RwLock::new(config),
        }
    }

    /// Load settings from `path`, falling back to defaults when the file is absent.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings file {:?}", path))?;
            let config: Configuration = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse settings file {:?}", path))?;
            config.repositories.validate()?;
            config
        } else {
            log::info!("No settings file at {:?}, using defaults", path);
            Configuration::default()
        };
        Ok(Self {
            path: Some(path),
            current: RwLock::new(config),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// A snapshot of the current settings.
    pub fn get(&self) -> Configuration {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Mutate the settings and persist them. Returns the updated snapshot.
    pub fn update(&self, f: impl FnOnce(&mut Configuration)) -> Result<Configuration> {
        let snapshot = {
            let mut guard = match self.current.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            f(&mut guard);
            guard.clone()
        };
        self.save(&snapshot)?;
        Ok(snapshot)
    }

    fn save(&self, config: &Configuration) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(config).context("Failed to serialize settings")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write settings file {:?}", path))?;
        log::debug!("Saved settings to {:?}", path);
        Ok(())
    }
}
