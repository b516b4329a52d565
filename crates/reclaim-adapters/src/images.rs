//! Image blob storage.
//!
//! The contract mirrors what the core expects of its file-storage
//! collaborator: take bytes plus a filename hint, hand back an opaque
//! reference string. Only the reference is ever persisted by the core.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use uuid::Uuid;

use crate::AdapterError;

pub trait ImageStore: Send + Sync {
    /// Store a blob and return its reference.
    fn store(&self, filename_hint: &str, bytes: &[u8]) -> Result<String, AdapterError>;

    /// Fetch a previously stored blob, `None` when the reference is unknown.
    fn load(&self, reference: &str) -> Result<Option<Vec<u8>>, AdapterError>;
}

/// Keep only characters that are safe in a flat filename; everything else
/// becomes an underscore.
fn sanitize_hint(hint: &str) -> String {
    let cleaned: String = hint
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Directory-backed store. References are flat filenames under the root;
/// anything with a path separator is rejected before touching the
/// filesystem.
#[derive(Debug)]
pub struct LocalImageStore {
    root: PathBuf,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn guard_reference(reference: &str) -> Result<(), AdapterError> {
        let flat = !reference.is_empty()
            && !reference.contains('/')
            && !reference.contains('\\')
            && reference != "."
            && reference != "..";
        if flat {
            Ok(())
        } else {
            Err(AdapterError::InvalidReference(reference.to_string()))
        }
    }
}

impl ImageStore for LocalImageStore {
    fn store(&self, filename_hint: &str, bytes: &[u8]) -> Result<String, AdapterError> {
        fs::create_dir_all(&self.root)?;
        let reference = format!("{}_{}", Uuid::new_v4(), sanitize_hint(filename_hint));

        // Write-then-rename so a crash mid-write never leaves a half blob
        // behind a live reference.
        let final_path = self.root.join(&reference);
        let tmp_path = self.root.join(format!("{reference}.tmp"));
        fs::write(&tmp_path, bytes)?;
        fs::rename(tmp_path, final_path)?;

        Ok(reference)
    }

    fn load(&self, reference: &str) -> Result<Option<Vec<u8>>, AdapterError> {
        Self::guard_reference(reference)?;
        match fs::read(self.root.join(reference)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store for tests and throwaway deployments.
#[derive(Debug, Default)]
pub struct MemoryImageStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImageStore for MemoryImageStore {
    fn store(&self, filename_hint: &str, bytes: &[u8]) -> Result<String, AdapterError> {
        let reference = format!("{}_{}", Uuid::new_v4(), sanitize_hint(filename_hint));
        self.blobs
            .lock()
            .map_err(|_| AdapterError::Storage("image store lock poisoned".to_string()))?
            .insert(reference.clone(), bytes.to_vec());
        Ok(reference)
    }

    fn load(&self, reference: &str) -> Result<Option<Vec<u8>>, AdapterError> {
        Ok(self
            .blobs
            .lock()
            .map_err(|_| AdapterError::Storage("image store lock poisoned".to_string()))?
            .get(reference)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_store_round_trips_and_sanitizes() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(dir.path());

        let reference = store.store("receipt photo (1).png", b"bytes").unwrap();
        assert!(reference.ends_with("receipt_photo__1_.png"));
        assert_eq!(store.load(&reference).unwrap().as_deref(), Some(&b"bytes"[..]));
    }

    #[test]
    fn local_store_rejects_path_traversal_references() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(dir.path());

        assert!(store.load("../etc/passwd").is_err());
        assert!(store.load("a/b").is_err());
        assert!(store.load("").is_err());
    }

    #[test]
    fn unknown_reference_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(dir.path());
        assert!(store.load("missing.png").unwrap().is_none());

        let memory = MemoryImageStore::new();
        assert!(memory.load("missing.png").unwrap().is_none());
    }

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryImageStore::new();
        let reference = store.store("proof.jpg", b"proof-bytes").unwrap();
        assert_eq!(
            store.load(&reference).unwrap().as_deref(),
            Some(&b"proof-bytes"[..])
        );
    }
}
