//! Shared resolution state: catalog, artifact and context futures plus the
//! sticky error flag.
//!
//! Each resource is single-flight per generation. A generation is started by
//! the first request, by [`LifecycleStore::reload`] or
//! [`LifecycleStore::refresh_catalog`], or when the current generation's
//! future completed with an error. Superseded futures keep running to
//! completion but nobody new awaits them.

use crate::artifact::{self, LocalArtifact};
use crate::bridge::{describe_preferences, PreferenceDescriptor};
use crate::config::{http_client, Configuration, SettingsFile};
use crate::error::PipelineError;
use crate::loader::{DecompilerContext, EngineLoader};
use crate::progress::{ProgressReporter, SilentProgressReporter};
use crate::resolver::{self, cache, CatalogError, VersionCatalog};
use crate::utils::lock;
use anyhow::Result;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;

pub type SharedCatalog = Shared<BoxFuture<'static, Arc<VersionCatalog>>>;
pub type SharedArtifact = Shared<BoxFuture<'static, Result<LocalArtifact, PipelineError>>>;
pub type SharedContext = Shared<BoxFuture<'static, Result<Arc<DecompilerContext>, PipelineError>>>;

struct Generation<F> {
    id: u64,
    future: F,
}

#[derive(Default)]
struct StoreInner {
    catalog: Option<SharedCatalog>,
    artifact: Option<Generation<SharedArtifact>>,
    context: Option<Generation<SharedContext>>,
}

/// Status written by background tasks. Kept apart from the store so spawned
/// work never holds the store itself.
#[derive(Default)]
struct PipelineStatus {
    generation: AtomicU64,
    had_error: AtomicBool,
    catalog_error: Mutex<Option<Arc<CatalogError>>>,
}

impl PipelineStatus {
    fn record<T>(&self, id: u64, stage: &str, result: &Result<T, PipelineError>) {
        let current = self.generation.load(Ordering::SeqCst) == id;
        match result {
            Ok(_) => {
                if current && self.had_error.swap(false, Ordering::SeqCst) {
                    log::info!("{} succeeded, decompiler re-enabled", stage);
                }
            }
            Err(e) => {
                log::error!("{} failed: {}", stage, e);
                if current {
                    self.had_error.store(true, Ordering::SeqCst);
                } else {
                    log::debug!("Ignoring failure of superseded generation {}", id);
                }
            }
        }
    }
}

fn completed_with_error<T: Clone>(future: &Shared<BoxFuture<'static, Result<T, PipelineError>>>) -> bool {
    matches!(future.peek(), Some(Err(_)))
}

pub struct LifecycleStore {
    settings: Arc<SettingsFile>,
    cache_dir: PathBuf,
    client: reqwest::Client,
    loader: Arc<dyn EngineLoader>,
    reporter: Arc<dyn ProgressReporter>,
    runtime: Handle,
    status: Arc<PipelineStatus>,
    inner: Mutex<StoreInner>,
    initialized: AtomicBool,
}

impl LifecycleStore {
    pub fn new(
        settings: Arc<SettingsFile>,
        cache_dir: impl Into<PathBuf>,
        loader: Arc<dyn EngineLoader>,
        runtime: Handle,
    ) -> Result<Self> {
        Ok(Self::with_client(settings, cache_dir, http_client()?, loader, runtime))
    }

    pub fn with_client(
        settings: Arc<SettingsFile>,
        cache_dir: impl Into<PathBuf>,
        client: reqwest::Client,
        loader: Arc<dyn EngineLoader>,
        runtime: Handle,
    ) -> Self {
        Self {
            settings,
            cache_dir: cache_dir.into(),
            client,
            loader,
            reporter: Arc::new(SilentProgressReporter),
            runtime,
            status: Arc::new(PipelineStatus::default()),
            inner: Mutex::new(StoreInner::default()),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// A snapshot of the current settings.
    pub fn settings(&self) -> Configuration {
        self.settings.get()
    }

    pub fn settings_file(&self) -> &Arc<SettingsFile> {
        &self.settings
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Sticky flag: a resolution stage of the current generation failed.
    pub fn had_error(&self) -> bool {
        self.status.had_error.load(Ordering::SeqCst)
    }

    /// The last catalog fetch failure, for the settings surface.
    pub fn catalog_error(&self) -> Option<Arc<CatalogError>> {
        lock(&self.status.catalog_error).clone()
    }

    pub fn generation(&self) -> u64 {
        self.status.generation.load(Ordering::SeqCst)
    }

    /// Start initial resolution. Later calls do nothing.
    pub fn initialize(&self) {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        let artifact = self.ensure_artifact();
        self.runtime.spawn(async move {
            match artifact.await {
                Ok(local) => log::info!("Vineflower {} ready at {:?}", local.version, local.path),
                Err(e) => log::warn!("Initial Vineflower resolution failed: {}", e),
            }
        });
    }

    pub fn catalog(&self) -> SharedCatalog {
        let mut inner = lock(&self.inner);
        self.current_catalog(&mut inner)
    }

    pub fn ensure_artifact(&self) -> SharedArtifact {
        let mut inner = lock(&self.inner);
        self.current_artifact(&mut inner).future
    }

    pub fn ensure_context(&self) -> SharedContext {
        let mut inner = lock(&self.inner);
        let artifact = self.current_artifact(&mut inner);
        if let Some(context) = &inner.context {
            if context.id == artifact.id && !completed_with_error(&context.future) {
                return context.future.clone();
            }
        }
        let future = self.spawn_context(artifact.id, artifact.future);
        inner.context = Some(Generation {
            id: artifact.id,
            future: future.clone(),
        });
        future
    }

    /// Wait for the current context from a plain thread.
    ///
    /// Must not be called from inside an async runtime.
    pub fn context_blocking(&self) -> Result<Arc<DecompilerContext>, PipelineError> {
        futures::executor::block_on(self.ensure_context())
    }

    /// Settings changed: resolve the artifact and context again.
    pub fn reload(&self) -> SharedArtifact {
        let mut inner = lock(&self.inner);
        self.start_artifact(&mut inner).future
    }

    /// Fetch the catalog again. The artifact chain restarts on the new catalog.
    pub fn refresh_catalog(&self) -> SharedCatalog {
        let mut inner = lock(&self.inner);
        let catalog = self.spawn_catalog();
        inner.catalog = Some(catalog.clone());
        self.start_artifact(&mut inner);
        catalog
    }

    /// Describe the preferences of the current engine archive.
    pub async fn preferences(&self) -> Result<Vec<PreferenceDescriptor>> {
        let artifact = self.ensure_artifact().await?;
        self.runtime
            .spawn_blocking(move || describe_preferences(&artifact.path))
            .await?
    }

    fn current_catalog(&self, inner: &mut StoreInner) -> SharedCatalog {
        inner.catalog.get_or_insert_with(|| self.spawn_catalog()).clone()
    }

    fn current_artifact(&self, inner: &mut StoreInner) -> Generation<SharedArtifact> {
        if let Some(current) = &inner.artifact {
            if !completed_with_error(&current.future) {
                return Generation {
                    id: current.id,
                    future: current.future.clone(),
                };
            }
        }
        self.start_artifact(inner)
    }

    /// Begin a new artifact generation; any existing context is superseded.
    fn start_artifact(&self, inner: &mut StoreInner) -> Generation<SharedArtifact> {
        let id = self.status.generation.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("Starting resolution generation {}", id);
        let catalog = self.current_catalog(inner);
        let future = self.spawn_artifact(id, catalog);
        inner.artifact = Some(Generation {
            id,
            future: future.clone(),
        });
        inner.context = None;
        Generation { id, future }
    }

    fn spawn_catalog(&self) -> SharedCatalog {
        let client = self.client.clone();
        let cache_dir = self.cache_dir.clone();
        let reporter = self.reporter.clone();
        let settings = self.settings.clone();
        let status = self.status.clone();

        let task = self.runtime.spawn(async move {
            let repositories = settings.get().repositories;
            let (catalog, error) = cache::fetch_or_cached(&client, &repositories, &cache_dir, reporter.as_ref()).await;
            *lock(&status.catalog_error) = error.map(Arc::new);

            let mut preview = settings.get();
            if resolver::apply_pin_policy(&mut preview, &catalog).is_some() {
                if let Err(e) = settings.update(|config| {
                    resolver::apply_pin_policy(config, &catalog);
                }) {
                    log::error!("Failed to save pinned version: {:#}", e);
                }
            }
            Arc::new(catalog)
        });

        async move {
            match task.await {
                Ok(catalog) => catalog,
                Err(e) => {
                    log::error!("Catalog task failed: {}", e);
                    Arc::new(VersionCatalog::empty())
                }
            }
        }
        .boxed()
        .shared()
    }

    fn spawn_artifact(&self, id: u64, catalog: SharedCatalog) -> SharedArtifact {
        let client = self.client.clone();
        let cache_dir = self.cache_dir.clone();
        let reporter = self.reporter.clone();
        let settings = self.settings.clone();
        let status = self.status.clone();

        let task = self.runtime.spawn(async move {
            let catalog = catalog.await;
            let config = settings.get();
            let result = artifact::ensure_artifact(&client, &config, &catalog, &cache_dir, reporter.as_ref())
                .await
                .map_err(PipelineError::from);
            status.record(id, "Engine download", &result);
            result
        });

        async move { task.await.map_err(PipelineError::from).and_then(|result| result) }
            .boxed()
            .shared()
    }

    fn spawn_context(&self, id: u64, artifact: SharedArtifact) -> SharedContext {
        let loader = self.loader.clone();
        let settings = self.settings.clone();
        let status = self.status.clone();

        let task = self.runtime.spawn(async move {
            let result = async {
                let local = artifact.await?;
                let config = settings.get();
                let context = tokio::task::spawn_blocking(move || loader.load(&local, &config))
                    .await?
                    .map_err(PipelineError::context)?;
                Ok::<_, PipelineError>(Arc::new(context))
            }
            .await;
            // The download stage already flagged its own failure.
            if !matches!(result, Err(PipelineError::Download(_))) {
                status.record(id, "Decompiler context", &result);
            }
            result
        });

        async move { task.await.map_err(PipelineError::from).and_then(|result| result) }
            .boxed()
            .shared()
    }
}
