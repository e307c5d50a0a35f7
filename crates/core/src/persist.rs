//! Small JSON file helpers shared by the on-disk stores

use crate::error::CoreResult;
use serde::{Serialize, de::DeserializeOwned};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::warn;

/// Write `value` as pretty JSON, replacing `path` in a single rename.
///
/// The temp file lives next to the target so the rename never crosses a
/// filesystem boundary.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized or the file cannot be
/// written or renamed into place.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> CoreResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let content = serde_json::to_vec_pretty(value)?;
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(&content)?;
    file.as_file().sync_all()?;
    file.persist(path)?;
    Ok(())
}

/// Read a JSON file, treating a missing or malformed file as absent.
#[must_use]
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = match std::fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Failed to read {}: {e}", path.display());
            return None;
        }
    };

    match serde_json::from_slice(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring malformed {}: {e}", path.display());
            None
        }
    }
}

/// Remove a file, ignoring one that is already gone.
///
/// # Errors
///
/// Returns an error for any failure other than the file being absent.
pub fn remove_file(path: &Path) -> CoreResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("value.json");

        let mut value = BTreeMap::new();
        value.insert("a".to_string(), 1);
        write_json_atomic(&path, &value).unwrap();

        let read: BTreeMap<String, i32> = read_json(&path).unwrap();
        assert_eq!(read, value);
    }

    #[test]
    fn test_malformed_reads_as_absent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();

        let read: Option<BTreeMap<String, i32>> = read_json(&path);
        assert!(read.is_none());
    }

    #[test]
    fn test_remove_missing_file_is_ok() {
        let temp_dir = TempDir::new().unwrap();
        assert!(remove_file(&temp_dir.path().join("missing.json")).is_ok());
    }
}
