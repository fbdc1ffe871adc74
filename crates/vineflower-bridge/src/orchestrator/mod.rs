//! Per-request decompile coordination.

pub mod handoff;
pub mod unit;

pub use handoff::{run_with_handoff, HandoffError};
pub use unit::DecompileUnit;

use crate::bridge::{
    build_options, ClassContextSource, CollectingSink, ContextSource, EngineError, EngineJob, ForwardingLogger,
    MapBytecodeProvider, OptionToggles, JAVA_LANGUAGE,
};
use crate::config::Configuration;
use crate::error::DecompileError;
use crate::host::{Host, InlineReadAccess, ReadAccess};
use crate::loader::DecompilerContext;
use crate::state::LifecycleStore;
use crate::utils::lock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecompileState {
    Idle,
    AwaitingContext,
    Running,
    Extracting,
    Done,
    Failed,
}

/// Which host integration is asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecompilerPath {
    /// Whole-file view; failures render a visible placeholder.
    Full,
    /// Text-only view; failures fall back to the host's own text.
    Light,
}

/// Text plus the optional bytecode-to-source line mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecompileOutput {
    pub text: String,
    pub line_mapping: Option<Vec<u32>>,
}

struct Request<'a> {
    file: &'a Path,
    state: DecompileState,
}

impl<'a> Request<'a> {
    fn new(file: &'a Path) -> Self {
        Self {
            file,
            state: DecompileState::Idle,
        }
    }

    fn transition(&mut self, to: DecompileState) {
        log::trace!("{:?}: {:?} -> {:?}", self.file, self.state, to);
        self.state = to;
    }
}

/// Run the engine over one unit with an already loaded context.
///
/// When the caller holds host write access the engine runs on a worker
/// thread and its read requests are executed back on this thread;
/// otherwise everything runs here under scoped read access.
pub fn decompile_unit(
    context: &DecompilerContext,
    host: &dyn Host,
    unit: &DecompileUnit,
    config: &Configuration,
) -> Result<DecompileOutput, EngineError> {
    let provider = MapBytecodeProvider::new(unit.read_bytecode()?);
    let sink = CollectingSink::new();
    let logger = ForwardingLogger::new();
    let options = build_options(
        &config.preferences,
        config.indent_size,
        OptionToggles {
            line_mapping: host.line_mapping_enabled(),
            dump_original_lines: host.dump_original_lines(),
        },
    );
    let classes = if context.capabilities().library_context {
        host.project_classes(unit.primary())
    } else {
        None
    };
    let is_cancelled = || host.is_cancelled();

    let run = |access: &dyn ReadAccess| {
        let library = classes
            .clone()
            .map(|classes| ClassContextSource::new(classes, access));
        context.engine().decompile(EngineJob {
            sources: unit.files(),
            bytecode: &provider,
            sink: &sink,
            options: &options,
            logger: &logger,
            library: library.as_ref().map(|l| l as &dyn ContextSource),
            is_cancelled: &is_cancelled,
        })
    };

    if host.holds_write_access() {
        run_with_handoff(run).map_err(|e| EngineError::Other(e.into()))??;
    } else {
        run(&InlineReadAccess::new(host))?;
    }

    let (text, line_mapping) = sink.into_result();
    if let Some(mapping) = &line_mapping {
        host.attach_line_mapping(unit.primary(), mapping);
    }
    Ok(DecompileOutput { text, line_mapping })
}

/// Host-facing decompiler entry points backed by a [`LifecycleStore`].
pub struct Orchestrator {
    store: Arc<LifecycleStore>,
    languages: Mutex<HashMap<PathBuf, (Weak<DecompilerContext>, String)>>,
}

impl Orchestrator {
    pub fn new(store: Arc<LifecycleStore>) -> Self {
        Self {
            store,
            languages: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<LifecycleStore> {
        &self.store
    }

    /// Whether `path` should handle `file` right now.
    pub fn accepts(&self, file: &Path, path: DecompilerPath) -> bool {
        if !self.store.settings().enabled || self.store.had_error() {
            return false;
        }
        match path {
            DecompilerPath::Light => true,
            DecompilerPath::Full => self.language(file).as_deref() == Some(JAVA_LANGUAGE),
        }
    }

    /// Detected language of `file`, cached until the context changes.
    pub fn language(&self, file: &Path) -> Option<String> {
        let context = match self.store.context_blocking() {
            Ok(context) => context,
            Err(e) => {
                log::debug!("No decompiler context for {:?}: {}", file, e);
                return None;
            }
        };

        if let Some((cached_for, language)) = lock(&self.languages).get(file) {
            if cached_for.upgrade().map_or(false, |c| Arc::ptr_eq(&c, &context)) {
                return Some(language.clone());
            }
        }

        let bytes = match std::fs::read(file) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::error!("Error while getting the language of {:?}: {}", file, e);
                return None;
            }
        };
        let language = context.language_of(&bytes);
        remember_language(&mut lock(&self.languages), file, &context, language.clone());
        Some(language)
    }

    /// Decompiled text for `file`, degraded per `path` on failure.
    pub fn text(&self, host: &dyn Host, file: &Path, path: DecompilerPath) -> Result<String, DecompileError> {
        let config = self.store.settings();
        if !config.enabled {
            return Err(DecompileError::Unavailable("decompiler disabled".into()));
        }
        if self.store.had_error() {
            return Err(DecompileError::Unavailable("engine resolution failed".into()));
        }

        let mut request = Request::new(file);
        let name = file.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        host.set_progress_text(&format!("Decompiling {}", name));

        request.transition(DecompileState::AwaitingContext);
        let context = match self.store.context_blocking() {
            Ok(context) => context,
            Err(e) => {
                log::debug!("Decompiler unavailable for {:?}: {}", file, e);
                request.transition(DecompileState::Failed);
                return Ok(host.original_text(file));
            }
        };

        let result = DecompileUnit::collect(file)
            .map_err(EngineError::from)
            .and_then(|unit| {
                request.transition(DecompileState::Running);
                decompile_unit(&context, host, &unit, &config)
            });

        match result {
            Ok(output) => {
                request.transition(DecompileState::Extracting);
                request.transition(DecompileState::Done);
                Ok(output.text)
            }
            Err(EngineError::Cancelled) => {
                request.transition(DecompileState::Failed);
                Err(DecompileError::Cancelled)
            }
            Err(e) if e.is_wrapped_io() => {
                log::warn!("{:?}: {}", file, e);
                request.transition(DecompileState::Done);
                Ok(String::new())
            }
            Err(e) => {
                request.transition(DecompileState::Failed);
                if host.is_unit_test_mode() {
                    return Err(DecompileError::Failed {
                        file: file.display().to_string(),
                        message: error_report(&e),
                    });
                }
                log::warn!("Cannot decompile {:?}: {}", file, e);
                Ok(match path {
                    DecompilerPath::Full => format!(
                        "// $VF: cannot decompile\n{}\n\n{}",
                        comment_lines(&error_report(&e)),
                        host.stub_text(file)
                    ),
                    DecompilerPath::Light => host.original_text(file),
                })
            }
        }
    }
}

fn error_report(error: &EngineError) -> String {
    match error {
        EngineError::Internal {
            message,
            cause: Some(cause),
        } => format!("{}\nCaused by: {}", message, cause),
        EngineError::Other(inner) => inner
            .chain()
            .enumerate()
            .map(|(i, e)| if i == 0 { e.to_string() } else { format!("Caused by: {}", e) })
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

fn comment_lines(text: &str) -> String {
    text.lines().map(|line| format!("// {}", line)).collect::<Vec<_>>().join("\n")
}

/// Cache `language` for `file`, dropping entries whose context is gone.
fn remember_language<C>(
    cache: &mut HashMap<PathBuf, (Weak<C>, String)>,
    file: &Path,
    context: &Arc<C>,
    language: String,
) {
    cache.retain(|_, (cached_for, _)| cached_for.strong_count() > 0);
    cache.insert(file.to_path_buf(), (Arc::downgrade(context), language));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Throwable;

    #[test]
    fn test_language_cache_drops_entries_of_dead_contexts() {
        let mut cache = HashMap::new();
        let old = Arc::new(1u32);
        remember_language(&mut cache, Path::new("/p/A.class"), &old, "java".into());
        remember_language(&mut cache, Path::new("/p/B.class"), &old, "kotlin".into());
        drop(old);

        let current = Arc::new(2u32);
        remember_language(&mut cache, Path::new("/p/C.class"), &current, "java".into());
        assert_eq!(cache.len(), 1);
        assert!(cache.contains_key(Path::new("/p/C.class")));

        remember_language(&mut cache, Path::new("/p/A.class"), &current, "kotlin".into());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache[Path::new("/p/A.class")].1, "kotlin");
    }

    #[test]
    fn test_error_report_includes_causes() {
        let internal = EngineError::Internal {
            message: "Method failed[com/example/Foo]".into(),
            cause: Some(Throwable::new("java.lang.IllegalStateException", "bad stack")),
        };
        assert_eq!(
            comment_lines(&error_report(&internal)),
            "// Method failed[com/example/Foo]\n// Caused by: java.lang.IllegalStateException: bad stack"
        );

        let other = EngineError::Other(anyhow::anyhow!("root").context("outer"));
        assert_eq!(error_report(&other), "outer\nCaused by: root");
    }
}
