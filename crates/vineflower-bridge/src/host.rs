//! The host application's side of a decompile call.

use anyhow::{Context, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Services the embedding application provides.
pub trait Host: Send + Sync {
    /// Whether the calling thread holds exclusive write access to host data.
    fn holds_write_access(&self) -> bool;

    /// Run `action` under a scoped read-access acquisition.
    fn run_read_action(&self, action: &mut dyn FnMut());

    /// The host's cooperative cancellation signal for the current call.
    fn is_cancelled(&self) -> bool {
        false
    }

    fn is_unit_test_mode(&self) -> bool {
        false
    }

    /// Classes of the project `file` belongs to, if the host can tell.
    fn project_classes(&self, _file: &Path) -> Option<Arc<dyn ProjectClasses>> {
        None
    }

    fn attach_line_mapping(&self, _file: &Path, _mapping: &[u32]) {}

    fn line_mapping_enabled(&self) -> bool {
        false
    }

    fn dump_original_lines(&self) -> bool {
        false
    }

    fn set_progress_text(&self, _text: &str) {}

    /// The file's content as the host shows it without a decompiler.
    fn original_text(&self, file: &Path) -> String;

    /// The host's own structural stub for a class file, appended below
    /// the error comment when decompilation fails.
    fn stub_text(&self, file: &Path) -> String {
        self.original_text(file)
    }
}

/// Project class lookup by internal name (`com/example/Foo$Bar`).
pub trait ProjectClasses: Send + Sync {
    fn find_class(&self, internal_name: &str) -> Option<Vec<u8>>;

    fn has_class(&self, internal_name: &str) -> bool {
        self.find_class(internal_name).is_some()
    }
}

/// Class lookup over class directories and archives, searched in order.
#[derive(Debug, Clone, Default)]
pub struct ClasspathClasses {
    roots: Vec<PathBuf>,
}

impl ClasspathClasses {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            roots: roots.into_iter().collect(),
        }
    }

    fn read_from_archive(archive: &Path, entry: &str) -> Result<Option<Vec<u8>>> {
        let file = std::fs::File::open(archive).with_context(|| format!("Failed to open {:?}", archive))?;
        let mut zip = zip::ZipArchive::new(file).with_context(|| format!("Failed to read archive {:?}", archive))?;
        let mut entry = match zip.by_name(entry) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("Failed to read entry in {:?}", archive)),
        };
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        Ok(Some(bytes))
    }
}

impl ProjectClasses for ClasspathClasses {
    fn find_class(&self, internal_name: &str) -> Option<Vec<u8>> {
        let entry = format!("{}.class", internal_name);
        for root in &self.roots {
            if root.is_dir() {
                if let Ok(bytes) = std::fs::read(root.join(&entry)) {
                    return Some(bytes);
                }
            } else if root.is_file() {
                match Self::read_from_archive(root, &entry) {
                    Ok(Some(bytes)) => return Some(bytes),
                    Ok(None) => {}
                    Err(e) => log::warn!("Skipping classpath root: {:#}", e),
                }
            }
        }
        None
    }
}

pub type ReadTask = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks that need host read access.
pub trait ReadAccess: Send + Sync {
    /// Run `task`, returning once it has run (or been dropped).
    fn run(&self, task: ReadTask);
}

/// Run `f` with read access and hand its result back.
///
/// `None` means the task never ran, e.g. because the owning thread is gone.
pub fn read_with<T, F>(access: &dyn ReadAccess, f: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, mut rx) = oneshot::channel();
    access.run(Box::new(move || {
        let _ = tx.send(f());
    }));
    rx.try_recv().ok()
}

/// Read access acquired in place on the calling thread.
pub struct InlineReadAccess<'h> {
    host: &'h dyn Host,
}

impl<'h> InlineReadAccess<'h> {
    pub fn new(host: &'h dyn Host) -> Self {
        Self { host }
    }
}

impl ReadAccess for InlineReadAccess<'_> {
    fn run(&self, task: ReadTask) {
        let mut task = Some(task);
        self.host.run_read_action(&mut || {
            if let Some(task) = task.take() {
                task();
            }
        });
    }
}
