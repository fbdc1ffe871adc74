use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const CLASS_EXTENSION: &str = "class";

/// A class file plus the same-directory class files of its nested types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompileUnit {
    /// Absolute paths, primary first, siblings sorted by name.
    files: Vec<PathBuf>,
}

impl DecompileUnit {
    /// Group `primary` with every `<stem>$*.class` next to it.
    pub fn collect(primary: &Path) -> Result<Self> {
        let primary = dunce::canonicalize(primary).with_context(|| format!("Class file not found: {:?}", primary))?;
        let stem = primary
            .file_stem()
            .and_then(|s| s.to_str())
            .with_context(|| format!("Not a class file name: {:?}", primary))?;
        let mask = format!("{}$", stem);
        let dir = primary
            .parent()
            .with_context(|| format!("Class file has no parent directory: {:?}", primary))?;

        let mut siblings: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to list {:?}", dir))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .filter(|path| {
                let is_class = path.extension().and_then(|e| e.to_str()) == Some(CLASS_EXTENSION);
                let matches = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map_or(false, |name| name.starts_with(&mask));
                is_class && matches
            })
            .collect();
        siblings.sort();

        let mut files = Vec::with_capacity(siblings.len() + 1);
        files.push(primary);
        files.extend(siblings);
        Ok(Self { files })
    }

    pub fn primary(&self) -> &Path {
        &self.files[0]
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Every member's bytes keyed by its absolute path.
    pub fn read_bytecode(&self) -> Result<BTreeMap<PathBuf, Vec<u8>>> {
        self.files
            .iter()
            .map(|path| {
                let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
                Ok((path.clone(), bytes))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_nested_classes_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["Foo.class", "Foo$Inner.class", "Foo$1.class", "Foobar.class", "Foo$Inner.java", "Bar$Foo.class"] {
            std::fs::write(dir.path().join(name), name.as_bytes()).unwrap();
        }

        let unit = DecompileUnit::collect(&dir.path().join("Foo.class")).unwrap();
        let names: Vec<&str> = unit
            .files()
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Foo.class", "Foo$1.class", "Foo$Inner.class"]);
        assert!(unit.primary().is_absolute());

        let bytes = unit.read_bytecode().unwrap();
        assert_eq!(bytes[unit.primary()], b"Foo.class");
    }

    #[test]
    fn test_missing_primary_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DecompileUnit::collect(&dir.path().join("Missing.class")).is_err());
    }
}
