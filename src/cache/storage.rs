//! Durable storage backends for cache entries
//!
//! The cache only needs a flat string-to-string store. `FileStorage` keeps one
//! JSON file per key in an XDG-compliant cache directory; `MemoryStorage` keeps
//! entries for the lifetime of the process.

use directories::ProjectDirs;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::error::StorageError;

/// A flat, string-keyed durable store
///
/// Reads and writes are synchronous; the cache finishes a read before making
/// any decision that depends on it.
pub trait CacheStorage: Send + Sync {
    /// Returns the raw stored text for `key`, or `None` if absent
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replaces the stored text for `key` as a whole
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Stores each cache entry as a JSON file on disk
///
/// Uses `~/.cache/homedash/` on Linux, or the equivalent platform path.
#[derive(Debug, Clone)]
pub struct FileStorage {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
}

impl FileStorage {
    /// Creates a FileStorage in the platform cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        Self::default_dir().map(Self::with_dir)
    }

    /// Creates a FileStorage rooted at a custom directory
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// The platform cache directory for homedash, if one exists
    pub fn default_dir() -> Option<PathBuf> {
        let project_dirs = ProjectDirs::from("", "", "homedash")?;
        Some(project_dirs.cache_dir().to_path_buf())
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path to the cache file for the given key
    fn cache_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", file_stem(key)))
    }

    fn io_error(path: &Path, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Maps an opaque cache key onto a safe file stem.
///
/// Characters outside `[A-Za-z0-9._-]` are percent-encoded so distinct keys
/// never share a file.
fn file_stem(key: &str) -> String {
    let mut stem = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' => {
                stem.push(byte as char)
            }
            other => stem.push_str(&format!("%{:02X}", other)),
        }
    }
    stem
}

impl CacheStorage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.cache_path(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(&path, e)),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.cache_dir).map_err(|e| Self::io_error(&self.cache_dir, e))?;

        // Write beside the target and rename so readers never see half an entry
        let path = self.cache_path(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(|e| Self::io_error(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| Self::io_error(&path, e))
    }
}

/// Keeps entries in memory only
///
/// Used with `--no-cache`, when no cache directory is available, and in tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
