pub mod artifact;
pub mod bridge;
pub mod config;
pub mod error;
pub mod host;
pub mod loader;
pub mod orchestrator;
pub mod progress;
pub mod resolver;
pub mod state;
pub mod utils;

// Re-export commonly used types
pub use artifact::{DownloadError, LocalArtifact};
pub use config::{Configuration, RepositoryUrls, SettingsFile};
pub use error::{DecompileError, PipelineError};
pub use host::{ClasspathClasses, Host, ProjectClasses};
pub use loader::{DecompilerContext, EngineLoader, JvmEngineLoader};
pub use orchestrator::{DecompilerPath, Orchestrator};
pub use progress::{LogProgressReporter, ProgressReporter, SilentProgressReporter};
pub use resolver::{CatalogError, VersionCatalog};
pub use state::LifecycleStore;
pub use utils::Version;
