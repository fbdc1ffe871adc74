//! Builds the isolated engine context for a downloaded archive.

pub mod java;
pub mod probe;

use crate::artifact::LocalArtifact;
use crate::bridge::{AnnotationLanguageDetector, Capabilities, Engine, JvmEngine, LanguageDetector, JAVA_LANGUAGE};
use crate::config::Configuration;
use anyhow::Result;
use std::fmt;
use std::sync::Arc;

/// A loaded engine plus the capabilities probed once at load time.
///
/// Owned by the lifecycle store. A superseded context is released when the
/// last in-flight call holding it finishes.
pub struct DecompilerContext {
    artifact: LocalArtifact,
    capabilities: Capabilities,
    engine: Arc<dyn Engine>,
    language: Option<Arc<dyn LanguageDetector>>,
}

impl DecompilerContext {
    pub fn new(
        artifact: LocalArtifact,
        capabilities: Capabilities,
        engine: Arc<dyn Engine>,
        language: Option<Arc<dyn LanguageDetector>>,
    ) -> Self {
        Self {
            artifact,
            capabilities,
            engine,
            language,
        }
    }

    pub fn artifact(&self) -> &LocalArtifact {
        &self.artifact
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    /// Language of a class file; `java` when the engine has no language support.
    pub fn language_of(&self, class_bytes: &[u8]) -> String {
        match &self.language {
            Some(detector) => detector.language(class_bytes),
            None => JAVA_LANGUAGE.to_string(),
        }
    }
}

impl fmt::Debug for DecompilerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecompilerContext")
            .field("artifact", &self.artifact)
            .field("capabilities", &self.capabilities)
            .field("language", &self.language.is_some())
            .finish()
    }
}

impl Drop for DecompilerContext {
    fn drop(&mut self) {
        log::debug!("Released decompiler context for Vineflower {}", self.artifact.version);
    }
}

/// Constructs a [`DecompilerContext`] from an archive on disk.
pub trait EngineLoader: Send + Sync {
    fn load(&self, artifact: &LocalArtifact, config: &Configuration) -> Result<DecompilerContext>;
}

/// Hosts the engine in a child JVM whose classpath is only the engine
/// archive.
#[derive(Debug, Clone, Copy, Default)]
pub struct JvmEngineLoader;

impl EngineLoader for JvmEngineLoader {
    fn load(&self, artifact: &LocalArtifact, config: &Configuration) -> Result<DecompilerContext> {
        let report = probe::probe_archive(&artifact.path)?;
        let java = java::locate_java(config.java_path.as_deref())?;
        let classpath = java::isolated_classpath(&artifact.path)?;
        log::info!(
            "Loading Vineflower {} with {:?} (classpath: {:?})",
            artifact.version,
            java,
            classpath
        );

        let language: Option<Arc<dyn LanguageDetector>> = report
            .capabilities
            .languages
            .then(|| Arc::new(AnnotationLanguageDetector::new(report.kotlin_plugin)) as Arc<dyn LanguageDetector>);
        let engine = Arc::new(JvmEngine::new(java, classpath, report.capabilities));
        Ok(DecompilerContext::new(artifact.clone(), report.capabilities, engine, language))
    }
}
