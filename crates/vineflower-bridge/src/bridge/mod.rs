//! Contracts between the orchestrator and a loaded engine.
//!
//! Every engine callback interface is a trait here. The orchestrator builds
//! adapters for one request, hands them to [`Engine::decompile`] in an
//! [`EngineJob`], and reads the result back out of the sink.

pub mod adapters;
pub mod jvm;
pub mod language;
pub mod options;
pub mod preferences;

pub use adapters::{ClassContextSource, CollectingSink, ForwardingLogger, MapBytecodeProvider};
pub use jvm::JvmEngine;
pub use language::{AnnotationLanguageDetector, JAVA_LANGUAGE, KOTLIN_LANGUAGE};
pub use options::{build_options, OptionToggles};
pub use preferences::{describe_preferences, PreferenceDescriptor, PreferenceType};

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Supplies the raw class-file bytes the engine asks for.
pub trait BytecodeProvider: Send + Sync {
    fn bytecode(&self, external_path: &Path, internal_path: Option<&str>) -> std::io::Result<Vec<u8>>;
}

/// Receives decompiled output.
pub trait ResultSink: Send + Sync {
    fn save_class(&self, qualified_name: &str, entry_name: &str, content: &str, mapping: Option<&[u32]>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Trace,
    Info,
    Warn,
    Error,
}

/// A throwable reported by the engine, reduced to its class and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Throwable {
    pub class_name: String,
    pub message: String,
}

impl Throwable {
    pub fn new(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: message.into(),
        }
    }

    pub fn is_io(&self) -> bool {
        self.class_name == "java.io.UncheckedIOException"
            || (self.class_name.starts_with("java.io.") && self.class_name.ends_with("Exception"))
    }

    pub fn is_interruption(&self) -> bool {
        matches!(
            self.class_name.as_str(),
            "java.lang.InterruptedException" | "java.util.concurrent.CancellationException"
        )
    }
}

impl fmt::Display for Throwable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str(&self.class_name)
        } else {
            write!(f, "{}: {}", self.class_name, self.message)
        }
    }
}

/// The engine's logging callback interface.
pub trait EngineLogger: Send + Sync {
    fn write_message(&self, severity: Severity, message: &str);

    /// A message carrying a throwable. An `Err` must abort the engine run.
    fn write_failure(&self, severity: Severity, message: &str, cause: &Throwable) -> Result<(), EngineError>;

    fn start_reading_class(&self, class_name: &str);

    fn end_reading_class(&self);
}

/// Lazy library lookups into the host's project, keyed by internal class name
/// (`java/util/List`).
pub trait ContextSource: Send + Sync {
    fn name(&self) -> &str;

    fn has_class(&self, internal_name: &str) -> bool;

    fn class_bytes(&self, internal_name: &str) -> Option<Vec<u8>>;
}

/// Decides which JVM language a class file was compiled from.
pub trait LanguageDetector: Send + Sync {
    fn language(&self, class_bytes: &[u8]) -> String;
}

/// What a loaded engine version offers beyond the base driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub library_context: bool,
    pub languages: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Cooperative cancellation; not a failure.
    #[error("Decompilation cancelled")]
    Cancelled,
    /// An error the engine reported through its logger.
    #[error("{message}")]
    Internal {
        message: String,
        cause: Option<Throwable>,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    /// The engine's own wrapped I/O failure, degraded to empty output.
    pub fn is_wrapped_io(&self) -> bool {
        matches!(self, EngineError::Internal { cause: Some(cause), .. } if cause.is_io())
    }
}

/// Everything one engine run needs.
pub struct EngineJob<'a> {
    /// External paths of the unit's class files, primary first.
    pub sources: &'a [PathBuf],
    pub bytecode: &'a dyn BytecodeProvider,
    pub sink: &'a dyn ResultSink,
    pub options: &'a BTreeMap<String, String>,
    pub logger: &'a dyn EngineLogger,
    pub library: Option<&'a dyn ContextSource>,
    pub is_cancelled: &'a (dyn Fn() -> bool + Sync),
}

pub trait Engine: Send + Sync {
    fn decompile(&self, job: EngineJob<'_>) -> Result<(), EngineError>;
}
