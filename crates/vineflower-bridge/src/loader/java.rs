//! Java runtime discovery and the engine's isolated classpath.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

#[cfg(windows)]
const JAVA_BINARY: &str = "java.exe";
#[cfg(not(windows))]
const JAVA_BINARY: &str = "java";

/// The configured runtime, else `$JAVA_HOME/bin/java`, else `java` on `PATH`.
pub fn locate_java(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return which::which(path).with_context(|| format!("Configured Java runtime not found: {:?}", path));
    }

    if let Some(home) = std::env::var_os("JAVA_HOME") {
        let candidate = PathBuf::from(home).join("bin").join(JAVA_BINARY);
        if candidate.is_file() {
            return Ok(candidate);
        }
        log::warn!("JAVA_HOME does not contain {:?}, searching PATH", candidate);
    }

    which::which(JAVA_BINARY).context("No Java runtime found: set javaPath, JAVA_HOME or add java to PATH")
}

/// Classpath roots for the child JVM: exactly the engine archive, nothing
/// from the host's own classpath.
pub fn isolated_classpath(engine_archive: &Path) -> Result<Vec<PathBuf>> {
    let root = dunce::canonicalize(engine_archive)
        .with_context(|| format!("Engine archive missing: {:?}", engine_archive))?;
    Ok(vec![root])
}
