//! One-shot capability probe of an engine archive.

use crate::bridge::Capabilities;
use crate::utils::jvm_class;
use anyhow::{Context, Result};
use noak::error::DecodeError;
use noak::reader::Class;
use std::io::Read;
use std::path::Path;

pub const DRIVER_ENTRY: &str = "org/jetbrains/java/decompiler/main/decompiler/ConsoleDecompiler.class";
const CONTEXT_SOURCE_ENTRY: &str = "org/jetbrains/java/decompiler/main/extern/IContextSource.class";
const LANGUAGE_SPEC_ENTRY: &str = "org/jetbrains/java/decompiler/api/language/LanguageSpec.class";
const PLUGIN_CONTEXT_ENTRY: &str = "org/jetbrains/java/decompiler/main/plugins/PluginContext.class";
const KOTLIN_PLUGIN_PREFIX: &str = "org/vineflower/kotlin/";

/// What the probe found in one archive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProbeReport {
    pub capabilities: Capabilities,
    /// Language plugins bundled alongside the engine.
    pub kotlin_plugin: bool,
}

pub fn probe_archive(archive: &Path) -> Result<ProbeReport> {
    let file = std::fs::File::open(archive).with_context(|| format!("Failed to open engine archive {:?}", archive))?;
    let mut zip = zip::ZipArchive::new(file).with_context(|| format!("Not a valid engine archive: {:?}", archive))?;

    if zip.index_for_name(DRIVER_ENTRY).is_none() {
        anyhow::bail!("{:?} does not contain the decompiler driver", archive);
    }

    // `isLazy` is the newest method on the context-source interface; older
    // engines ship the interface without lazy lookup support.
    let library_context = match read_entry(&mut zip, CONTEXT_SOURCE_ENTRY)? {
        Some(bytes) => declares_method(&bytes, "isLazy").unwrap_or_else(|e| {
            log::debug!("Unreadable {}: {}", CONTEXT_SOURCE_ENTRY, e);
            false
        }),
        None => false,
    };
    let languages = zip.index_for_name(LANGUAGE_SPEC_ENTRY).is_some()
        && zip.index_for_name(PLUGIN_CONTEXT_ENTRY).is_some();
    let kotlin_plugin = languages && zip.file_names().any(|name| name.starts_with(KOTLIN_PLUGIN_PREFIX));

    let report = ProbeReport {
        capabilities: Capabilities {
            library_context,
            languages,
        },
        kotlin_plugin,
    };
    log::info!("Probed {:?}: {:?}", archive, report);
    Ok(report)
}

fn declares_method(class_bytes: &[u8], name: &str) -> Result<bool, DecodeError> {
    let class = Class::new(class_bytes)?;
    for method in class.methods() {
        if jvm_class::utf8(class.pool(), method?.name())? == name {
            return Ok(true);
        }
    }
    Ok(false)
}

fn read_entry<R: Read + std::io::Seek>(zip: &mut zip::ZipArchive<R>, name: &str) -> Result<Option<Vec<u8>>> {
    let mut entry = match zip.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", name)),
    };
    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut bytes)?;
    Ok(Some(bytes))
}
