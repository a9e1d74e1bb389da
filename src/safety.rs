//! Safety utilities for the database backup taken before a run.
//!
//! These checks prevent the backup copy from ever overwriting the library
//! database it is meant to protect, or the ComicRack export being read.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Marker that every backup filename must contain.
pub const BACKUP_PATTERN: &str = "backup";

/// `library.ydb` → `library-backup.ydb`, next to the original.
pub fn backup_path_for(store: &Path) -> PathBuf {
    let stem = store.file_stem().and_then(|s| s.to_str()).unwrap_or("library");
    let name = match store.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}-{}.{}", stem, BACKUP_PATTERN, ext),
        None => format!("{}-{}", stem, BACKUP_PATTERN),
    };
    store.with_file_name(name)
}

/// Resolves symlinks and `..` when the file exists, so two spellings of the
/// same file compare equal.
fn resolved(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Validates that `backup` is safe to (over)write with a copy of `store`.
///
/// Checks:
/// - The database to back up exists and is a regular file
/// - Backup filename contains [`BACKUP_PATTERN`]
/// - Backup is neither the database nor the ComicRack document, after
///   resolving symlinks and relative segments
/// - An existing backup is a regular file, never a directory
pub fn validate_backup_path(backup: &Path, store: &Path, source_document: &Path) -> Result<()> {
    if !store.is_file() {
        bail!(
            "Safety check failed: database '{}' does not exist or is not a file",
            store.display()
        );
    }

    let backup_name = backup.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if !backup_name.contains(BACKUP_PATTERN) {
        bail!(
            "Safety check failed: backup file '{}' must contain '{}' in the name",
            backup.display(),
            BACKUP_PATTERN
        );
    }

    let target = resolved(backup);
    for (role, protected) in [("database", store), ("ComicRack document", source_document)] {
        if backup == protected || target == resolved(protected) {
            bail!(
                "Safety check failed: backup '{}' cannot be the {} '{}'",
                backup.display(),
                role,
                protected.display()
            );
        }
    }

    if backup.exists() && !backup.is_file() {
        bail!(
            "Safety check failed: backup '{}' exists and is not a regular file",
            backup.display()
        );
    }

    Ok(())
}

/// Copy the database to its backup path, returning that path.
pub fn backup_store(store: &Path, source_document: &Path) -> Result<PathBuf> {
    let backup = backup_path_for(store);
    validate_backup_path(&backup, store, source_document)?;
    fs::copy(store, &backup)
        .with_context(|| format!("Failed to back up {} to {}", store.display(), backup.display()))?;
    Ok(backup)
}
