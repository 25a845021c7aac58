//! Artifact persistence
//!
//! The orchestrator never touches the file system directly; it writes
//! through an [`ArtifactStore`], which also answers the directory listings
//! migration numbering depends on. Reads and removals let a table whose
//! writes fail partway be rolled back.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::trace;

/// Write and list capability for generated artifacts
pub trait ArtifactStore {
    /// Persist `contents` at `path`, creating parent directories as needed
    fn write(&mut self, path: &Path, contents: &str) -> io::Result<()>;

    /// Current contents of `path`, or `None` when nothing is stored there
    fn read(&self, path: &Path) -> io::Result<Option<String>>;

    /// Delete `path`; removing a missing path is not an error
    fn remove(&mut self, path: &Path) -> io::Result<()>;

    /// File names directly inside `dir`, or `None` when `dir` does not exist
    fn list(&self, dir: &Path) -> io::Result<Option<Vec<String>>>;
}

/// Store backed by the local file system
#[derive(Debug, Default, Clone, Copy)]
pub struct FsStore;

impl ArtifactStore for FsStore {
    fn write(&mut self, path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, contents)?;
        trace!(path = ?path, bytes = contents.len(), "Wrote artifact");
        Ok(())
    }

    fn read(&self, path: &Path) -> io::Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn remove(&mut self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Ok(()) => {
                trace!(path = ?path, "Removed artifact");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn list(&self, dir: &Path) -> io::Result<Option<Vec<String>>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(Some(names))
    }
}

/// In-memory store, used by tests and dry runs
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    files: BTreeMap<PathBuf, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<&str> {
        self.files.get(path.as_ref()).map(String::as_str)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl ArtifactStore for MemoryStore {
    fn write(&mut self, path: &Path, contents: &str) -> io::Result<()> {
        self.files.insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn read(&self, path: &Path) -> io::Result<Option<String>> {
        Ok(self.files.get(path).cloned())
    }

    fn remove(&mut self, path: &Path) -> io::Result<()> {
        self.files.remove(path);
        Ok(())
    }

    fn list(&self, dir: &Path) -> io::Result<Option<Vec<String>>> {
        let mut exists = false;
        let mut names = Vec::new();
        for path in self.files.keys() {
            if !path.starts_with(dir) {
                continue;
            }
            exists = true;
            if path.parent() == Some(dir) {
                if let Some(name) = path.file_name() {
                    names.push(name.to_string_lossy().into_owned());
                }
            }
        }
        Ok(exists.then_some(names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_lists_direct_children_only() {
        let mut store = MemoryStore::new();
        store.write(Path::new("out/db/V2__a.sql"), "a").unwrap();
        store.write(Path::new("out/db/nested/V9__b.sql"), "b").unwrap();

        let mut names = store.list(Path::new("out/db")).unwrap().unwrap();
        names.sort();
        assert_eq!(names, vec!["V2__a.sql".to_string()]);
        assert_eq!(store.list(Path::new("out/missing")).unwrap(), None);
        assert_eq!(store.get("out/db/V2__a.sql"), Some("a"));
    }

    #[test]
    fn test_fs_store_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsStore;
        let path = dir.path().join("app/entity/User.java");

        store.write(&path, "class User {}").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "class User {}");
        assert_eq!(
            store.list(&dir.path().join("app/entity")).unwrap(),
            Some(vec!["User.java".to_string()])
        );
        assert_eq!(store.list(&dir.path().join("nope")).unwrap(), None);
    }

    #[test]
    fn test_read_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db/V2__a.sql");
        let mut fs_store = FsStore;
        let mut memory = MemoryStore::new();

        for store in [&mut fs_store as &mut dyn ArtifactStore, &mut memory] {
            assert_eq!(store.read(&path).unwrap(), None);
            store.write(&path, "create").unwrap();
            assert_eq!(store.read(&path).unwrap().as_deref(), Some("create"));

            store.remove(&path).unwrap();
            assert_eq!(store.read(&path).unwrap(), None);
            store.remove(&path).unwrap();
        }
        assert!(memory.is_empty());
    }
}
