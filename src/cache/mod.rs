//! On-disk cache of fetched documents
//!
//! One JSON file per document, named by the sanitized document key. The
//! presence of a file is the only index. Failures are logged and treated as
//! misses; nothing here returns an error to the caller.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

const CACHE_FILE_EXTENSION: &str = "json";

#[derive(Debug, Error)]
enum CacheError {
    #[error("cache I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("cache entry could not be (de)serialized: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Entry count and size, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: u64,
    pub total_bytes: u64,
}

/// Map a document key to a file-safe name. Anything outside
/// `[A-Za-z0-9_-]` becomes `_`, so distinct keys can collide.
pub fn sanitize_key(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Best-effort document cache rooted at one directory.
#[derive(Debug, Clone)]
pub struct DocumentCache {
    root: PathBuf,
}

impl DocumentCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Platform cache directory for this application.
    pub fn default_dir() -> Option<PathBuf> {
        ProjectDirs::from("com", "figma-fetch", "figma-fetch")
            .map(|dirs| dirs.cache_dir().join("files"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", sanitize_key(key), CACHE_FILE_EXTENSION))
    }

    pub fn contains(&self, key: &str) -> bool {
        !key.trim().is_empty() && self.entry_path(key).is_file()
    }

    /// Store `document` under `key`, replacing any previous entry.
    pub fn save<D: Serialize>(&self, key: &str, document: &D) {
        if key.trim().is_empty() {
            tracing::warn!("Cannot cache document with an empty key");
            return;
        }
        match self.write_entry(key, document) {
            Ok(path) => tracing::info!("Cached document {} to {}", key, path.display()),
            Err(e) => tracing::error!("Failed to cache document {}: {}", key, e),
        }
    }

    fn write_entry<D: Serialize>(&self, key: &str, document: &D) -> Result<PathBuf, CacheError> {
        fs::create_dir_all(&self.root)?;
        let json = serde_json::to_vec_pretty(document)?;

        // Write then rename so a concurrent reader never sees half a file
        let path = self.entry_path(key);
        let tmp = self
            .root
            .join(format!(".{}.{}.tmp", sanitize_key(key), uuid::Uuid::new_v4()));
        fs::write(&tmp, json)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(path)
    }

    /// Cached document for `key`. Missing, unreadable and corrupt entries
    /// are all misses.
    pub fn load<D: DeserializeOwned>(&self, key: &str) -> Option<D> {
        if key.trim().is_empty() {
            return None;
        }
        let path = self.entry_path(key);
        if !path.is_file() {
            tracing::debug!("No cache entry for {}", key);
            return None;
        }
        match read_entry(&path) {
            Ok(document) => {
                tracing::info!("Loaded cached document {}", key);
                Some(document)
            }
            Err(e) => {
                tracing::warn!("Ignoring unusable cache entry {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Remove the entry for `key`, if any.
    pub fn invalidate(&self, key: &str) {
        if key.trim().is_empty() {
            return;
        }
        let path = self.entry_path(key);
        match fs::remove_file(&path) {
            Ok(()) => tracing::info!("Cleared cache for {}", key),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::error!("Failed to clear cache for {}: {}", key, e),
        }
    }

    /// Remove every entry under the cache root.
    pub fn invalidate_all(&self) {
        let entries = match self.entries() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("Failed to list cache directory: {}", e);
                return;
            }
        };
        for path in entries {
            match fs::remove_file(&path) {
                Ok(()) => tracing::debug!("Deleted cache file {}", path.display()),
                Err(e) => tracing::error!("Failed to delete {}: {}", path.display(), e),
            }
        }
        tracing::info!("Cleared all cache files");
    }

    pub fn stats(&self) -> CacheStats {
        let entries = match self.entries() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("Failed to read cache stats: {}", e);
                return CacheStats::default();
            }
        };
        entries.iter().fold(CacheStats::default(), |mut stats, path| {
            stats.entries += 1;
            stats.total_bytes += fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            stats
        })
    }

    /// Entry files currently on disk. A missing root means no entries.
    fn entries(&self) -> io::Result<Vec<PathBuf>> {
        let dir = match fs::read_dir(&self.root) {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut paths = Vec::new();
        for entry in dir {
            let path = entry?.path();
            let is_entry = path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(CACHE_FILE_EXTENSION);
            if is_entry {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

fn read_entry<D: DeserializeOwned>(path: &Path) -> Result<D, CacheError> {
    let content = fs::read(path)?;
    Ok(serde_json::from_slice(&content)?)
}
