use super::{BytecodeProvider, ContextSource, EngineError, EngineLogger, ResultSink, Severity, Throwable};
use crate::host::{read_with, ProjectClasses, ReadAccess};
use crate::utils::lock;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const LOG_TARGET: &str = "vineflower";

/// Serves class bytes captured for one request, keyed by absolute path.
#[derive(Debug, Default)]
pub struct MapBytecodeProvider {
    classes: BTreeMap<PathBuf, Vec<u8>>,
}

impl MapBytecodeProvider {
    pub fn new(classes: BTreeMap<PathBuf, Vec<u8>>) -> Self {
        Self { classes }
    }
}

impl BytecodeProvider for MapBytecodeProvider {
    fn bytecode(&self, external_path: &Path, _internal_path: Option<&str>) -> io::Result<Vec<u8>> {
        self.classes.get(external_path).cloned().ok_or_else(|| {
            let known: Vec<String> = self.classes.keys().map(|p| p.display().to_string()).collect();
            io::Error::new(
                io::ErrorKind::NotFound,
                format!(
                    "No bytecode for {} (known: {})",
                    external_path.display(),
                    known.join(", ")
                ),
            )
        })
    }
}

/// Keeps the first non-empty class text the engine saves.
#[derive(Debug, Default)]
pub struct CollectingSink {
    result: Mutex<(String, Option<Vec<u32>>)>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_result(self) -> (String, Option<Vec<u32>>) {
        match self.result.into_inner() {
            Ok(result) => result,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl ResultSink for CollectingSink {
    fn save_class(&self, qualified_name: &str, _entry_name: &str, content: &str, mapping: Option<&[u32]>) {
        let mut result = lock(&self.result);
        if result.0.is_empty() {
            *result = (content.to_string(), mapping.map(<[u32]>::to_vec));
        } else {
            log::debug!(target: LOG_TARGET, "Ignoring additional output for {}", qualified_name);
        }
    }
}

/// Forwards engine log output to the `log` facade.
///
/// Interruptions become cooperative cancellation and errors carrying a
/// throwable abort the run as [`EngineError::Internal`].
#[derive(Debug, Default)]
pub struct ForwardingLogger {
    current_class: Mutex<Option<String>>,
}

impl ForwardingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    fn extend(&self, message: &str) -> String {
        match lock(&self.current_class).as_deref() {
            Some(class) => format!("{}[{}]", message, class),
            None => message.to_string(),
        }
    }
}

impl EngineLogger for ForwardingLogger {
    fn write_message(&self, severity: Severity, message: &str) {
        let text = self.extend(message);
        match severity {
            Severity::Error => log::error!(target: LOG_TARGET, "{}", text),
            Severity::Warn => log::warn!(target: LOG_TARGET, "{}", text),
            Severity::Info => log::info!(target: LOG_TARGET, "{}", text),
            Severity::Trace => log::debug!(target: LOG_TARGET, "{}", text),
        }
    }

    fn write_failure(&self, severity: Severity, message: &str, cause: &Throwable) -> Result<(), EngineError> {
        if cause.is_interruption() {
            log::debug!(target: LOG_TARGET, "Engine interrupted: {}", cause);
            return Err(EngineError::Cancelled);
        }
        let text = self.extend(message);
        match severity {
            Severity::Error => {
                return Err(EngineError::Internal {
                    message: text,
                    cause: Some(cause.clone()),
                })
            }
            Severity::Warn => log::warn!(target: LOG_TARGET, "{}: {}", text, cause),
            Severity::Info => log::info!(target: LOG_TARGET, "{}: {}", text, cause),
            Severity::Trace => log::debug!(target: LOG_TARGET, "{}: {}", text, cause),
        }
        Ok(())
    }

    fn start_reading_class(&self, class_name: &str) {
        log::debug!(target: LOG_TARGET, "decompiling class {}", class_name);
        *lock(&self.current_class) = Some(class_name.to_string());
    }

    fn end_reading_class(&self) {
        log::debug!(target: LOG_TARGET, "... class decompiled");
        *lock(&self.current_class) = None;
    }
}

/// Library lookups answered from the host project, each under read access.
pub struct ClassContextSource<'a> {
    classes: Arc<dyn ProjectClasses>,
    access: &'a dyn ReadAccess,
}

impl<'a> ClassContextSource<'a> {
    pub fn new(classes: Arc<dyn ProjectClasses>, access: &'a dyn ReadAccess) -> Self {
        Self { classes, access }
    }
}

impl ContextSource for ClassContextSource<'_> {
    fn name(&self) -> &str {
        "Host Project Classes"
    }

    fn has_class(&self, internal_name: &str) -> bool {
        let classes = Arc::clone(&self.classes);
        let name = internal_name.to_string();
        read_with(self.access, move || classes.has_class(&name)).unwrap_or(false)
    }

    fn class_bytes(&self, internal_name: &str) -> Option<Vec<u8>> {
        let classes = Arc::clone(&self.classes);
        let name = internal_name.to_string();
        read_with(self.access, move || classes.find_class(&name)).flatten()
    }
}
