//! Whole-file persistence.
//!
//! Reads and writes are all-or-nothing: a reader sees either the previous
//! file or the complete new one, never a partial write.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tempfile::NamedTempFile;

use crate::error::{CnabError, Result};

pub trait FileStore {
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;
}

/// Local filesystem store.
///
/// Writes go to a temporary file next to the target, which is then renamed
/// over it.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsStore;

impl FileStore for FsStore {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|source| CnabError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let write_err = |source: std::io::Error| CnabError::Write {
            path: path.to_path_buf(),
            source,
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(bytes).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}

/// In-memory store, for callers that hand bytes to another transport.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }
}

impl FileStore for MemoryStore {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| CnabError::Read {
                path: path.to_path_buf(),
                source: std::io::ErrorKind::NotFound.into(),
            })
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.files.lock().insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("COB0101.REM");

        FsStore.write(&path, b"first").unwrap();
        FsStore.write(&path, b"second").unwrap();
        assert_eq!(FsStore.read(&path).unwrap(), b"second");

        // Only the target is left behind; temporary files are renamed away.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_fs_store_errors_name_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.ret");
        match FsStore.read(&missing) {
            Err(CnabError::Read { path, .. }) => assert_eq!(path, missing),
            other => panic!("Expected Read error, got {other:?}"),
        }

        let nowhere = dir.path().join("no-such-dir").join("out.rem");
        match FsStore.write(&nowhere, b"x") {
            Err(CnabError::Write { path, .. }) => assert_eq!(path, nowhere),
            other => panic!("Expected Write error, got {other:?}"),
        }
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        store.write(Path::new("a.rem"), b"abc").unwrap();
        assert_eq!(store.read(Path::new("a.rem")).unwrap(), b"abc");
        assert_eq!(store.len(), 1);
        assert!(matches!(
            store.read(Path::new("b.rem")),
            Err(CnabError::Read { .. })
        ));
    }
}
