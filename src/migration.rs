//! Migration version allocation
//!
//! Versions are derived from the migration files already present in the
//! store, not from in-memory run state, so each allocation observes every
//! migration written before it.

use std::num::ParseIntError;
use std::path::PathBuf;

use tracing::{debug, error};

use crate::error::SchemagenError;
use crate::store::ArtifactStore;

/// Reserved for the bootstrap migration, which this pipeline never writes
pub const BASELINE_VERSION: u64 = 1;

/// Allocates `V<n>` numbers for migrations in one directory
#[derive(Debug, Clone)]
pub struct VersionAllocator {
    dir: PathBuf,
}

impl VersionAllocator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn error(&self, message: String) -> SchemagenError {
        error!(dir = ?self.dir, message = %message, "Migration version allocation failed");
        SchemagenError::Migration {
            dir: self.dir.display().to_string(),
            message,
        }
    }

    /// Highest existing version plus one, never below `BASELINE_VERSION + 1`.
    /// A file whose version cannot be read as a number is an error.
    pub fn next_version<S>(&self, store: &S) -> Result<u64, SchemagenError>
    where
        S: ArtifactStore + ?Sized,
    {
        let names = store.list(&self.dir).map_err(|e| {
            error!(dir = ?self.dir, error = ?e, "Failed to list migration directory");
            e
        })?;

        let mut highest = 0;
        for name in names.unwrap_or_default() {
            match parse_version(&name) {
                Ok(Some(version)) => highest = highest.max(version),
                Ok(None) => {}
                Err(e) => {
                    return Err(self.error(format!("version of '{}' is out of range: {}", name, e)))
                }
            }
        }

        let next = highest
            .max(BASELINE_VERSION)
            .checked_add(1)
            .ok_or_else(|| self.error(format!("no version follows {}", highest)))?;
        debug!(dir = ?self.dir, highest = highest, next = next, "Allocated migration version");
        Ok(next)
    }
}

/// Numeric prefix of a `V<digits>...` file name; `Ok(None)` for other files
pub fn parse_version(file_name: &str) -> Result<Option<u64>, ParseIntError> {
    let Some(rest) = file_name.strip_prefix('V') else {
        return Ok(None);
    };
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Ok(None);
    }
    digits.parse().map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::path::Path;

    fn store_with(files: &[&str]) -> MemoryStore {
        let mut store = MemoryStore::new();
        for name in files {
            store
                .write(&Path::new("db/migration").join(name), "-- sql")
                .unwrap();
        }
        store
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("V2__create_users_table.sql"), Ok(Some(2)));
        assert_eq!(parse_version("V15.sql"), Ok(Some(15)));
        assert_eq!(parse_version("V5000000000__wide.sql"), Ok(Some(5_000_000_000)));
        assert_eq!(parse_version("V__x.sql"), Ok(None));
        assert_eq!(parse_version("v3__lower.sql"), Ok(None));
        assert_eq!(parse_version("README.md"), Ok(None));
        assert!(parse_version("V99999999999999999999999__huge.sql").is_err());
    }

    #[test]
    fn test_versions_beyond_u32_stay_monotonic() {
        let allocator = VersionAllocator::new("db/migration");
        let store = store_with(&["V4294967295__x.sql"]);
        assert_eq!(allocator.next_version(&store).unwrap(), 4_294_967_296);

        let store = store_with(&["V5000000000__x.sql", "V3__y.sql"]);
        assert_eq!(allocator.next_version(&store).unwrap(), 5_000_000_001);
    }

    #[test]
    fn test_unreadable_version_is_an_error() {
        let allocator = VersionAllocator::new("db/migration");
        let store = store_with(&["V2__a.sql", "V99999999999999999999999__huge.sql"]);

        let err = allocator.next_version(&store).unwrap_err();
        assert!(matches!(err, SchemagenError::Migration { .. }));
        assert!(err.to_string().contains("V99999999999999999999999__huge.sql"));
    }

    #[test]
    fn test_exhausted_versions_are_an_error() {
        let allocator = VersionAllocator::new("db/migration");
        let last = format!("V{}__last.sql", u64::MAX);
        let store = store_with(&[last.as_str()]);

        let err = allocator.next_version(&store).unwrap_err();
        assert!(err.to_string().contains("no version follows"));
    }

    #[test]
    fn test_missing_directory_starts_after_baseline() {
        let allocator = VersionAllocator::new("db/migration");
        assert_eq!(allocator.next_version(&MemoryStore::new()).unwrap(), 2);
    }

    #[test]
    fn test_empty_directory_starts_after_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = VersionAllocator::new(dir.path());
        assert_eq!(allocator.next_version(&crate::store::FsStore).unwrap(), 2);
    }

    #[test]
    fn test_next_version_ignores_listing_order() {
        let allocator = VersionAllocator::new("db/migration");
        let forward = store_with(&["V2__x.sql", "V5__y.sql"]);
        let backward = store_with(&["V5__y.sql", "V2__x.sql", "notes.txt"]);
        assert_eq!(allocator.next_version(&forward).unwrap(), 6);
        assert_eq!(allocator.next_version(&backward).unwrap(), 6);
    }

    #[test]
    fn test_allocation_observes_previous_write() {
        let allocator = VersionAllocator::new("db/migration");
        let mut store = MemoryStore::new();

        let first = allocator.next_version(&store).unwrap();
        store
            .write(&Path::new("db/migration").join(format!("V{}__a.sql", first)), "")
            .unwrap();
        let second = allocator.next_version(&store).unwrap();

        assert_eq!((first, second), (2, 3));
    }

    #[test]
    fn test_baseline_only_directory() {
        let allocator = VersionAllocator::new("db/migration");
        let store = store_with(&["V1__baseline.sql"]);
        assert_eq!(allocator.next_version(&store).unwrap(), 2);
    }
}
