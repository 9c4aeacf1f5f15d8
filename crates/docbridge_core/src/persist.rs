//! Crash-safe file writes.
//!
//! Replacing a file goes through a sibling temp file:
//! 1. Write the temp file
//! 2. Sync it to disk
//! 3. Rename it over the target
//! 4. Fsync the directory so the rename is durable

use crate::error::{CoreError, CoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

/// Atomically replaces `path` with `data`, creating parent directories.
pub fn write_atomic(path: &Path, data: &[u8]) -> CoreResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| CoreError::invalid_path(path.display().to_string()))?;
    fs::create_dir_all(dir)?;

    let name = path
        .file_name()
        .ok_or_else(|| CoreError::invalid_path(path.display().to_string()))?
        .to_string_lossy();
    let temp_path = dir.join(format!(".{name}.tmp"));

    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    sync_directory(dir)
}

/// Writes `data` to a file that must not exist yet.
pub fn write_new(path: &Path, data: &[u8]) -> CoreResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| CoreError::invalid_path(path.display().to_string()))?;
    fs::create_dir_all(dir)?;

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(CoreError::ArchiveExists {
                path: path.display().to_string(),
            })
        }
        Err(e) => return Err(e.into()),
    };
    file.write_all(data)?;
    file.sync_all()?;
    sync_directory(dir)
}

/// Serializes `value` as pretty JSON and writes it atomically.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> CoreResult<()> {
    let data = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &data)
}

/// Reads a JSON file. Returns `Ok(None)` if it does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> CoreResult<Option<T>> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_slice(&data)?))
}

#[cfg(unix)]
fn sync_directory(dir: &Path) -> CoreResult<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_directory(_dir: &Path) -> CoreResult<()> {
    // NTFS journals metadata; directory handles cannot be fsynced.
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[test]
    fn atomic_write_replaces() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("file.txt");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"two");
        assert!(!temp.path().join("nested").join(".file.txt.tmp").exists());
    }

    #[test]
    fn write_new_refuses_overwrite() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("record.md");
        write_new(&path, b"first").unwrap();
        let err = write_new(&path, b"second").unwrap_err();
        assert!(matches!(err, CoreError::ArchiveExists { .. }));
        assert_eq!(fs::read(&path).unwrap(), b"first");
    }

    #[test]
    fn json_round_trip_and_missing() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("state.json");
        let missing: Option<BTreeMap<String, u32>> = read_json(&path).unwrap();
        assert!(missing.is_none());

        let mut map = BTreeMap::new();
        map.insert("a".to_string(), 1u32);
        write_json(&path, &map).unwrap();
        let loaded: BTreeMap<String, u32> = read_json(&path).unwrap().unwrap();
        assert_eq!(loaded, map);
    }
}
