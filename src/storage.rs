//! Persistent content-hash index, one per output directory.
//!
//! The index is loaded when a site's pipeline starts, extended in memory as
//! files are persisted, and rewritten atomically at the end of the run.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// File name of the index inside a site directory.
pub const INDEX_FILE_NAME: &str = ".hash_index.json";

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed index at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Where a hash was first saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenMarker {
    pub file_name: String,
    pub first_seen: DateTime<Utc>,
}

/// Content hash → first file saved with that content.
#[derive(Debug, Default)]
pub struct HashIndex {
    path: PathBuf,
    entries: BTreeMap<String, SeenMarker>,
    dirty: bool,
}

impl HashIndex {
    /// Index path for a site directory.
    pub fn path_for(site_dir: &Path) -> PathBuf {
        site_dir.join(INDEX_FILE_NAME)
    }

    /// Load the index for `site_dir`; a missing file is an empty index.
    pub fn load(site_dir: &Path) -> Result<Self, IndexError> {
        let path = Self::path_for(site_dir);
        let entries = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|source| IndexError::Json {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(IndexError::Io { path, source }),
        };
        debug!("Loaded {} hashes from {}", entries.len(), path.display());
        Ok(Self {
            path,
            entries,
            dirty: false,
        })
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.entries.contains_key(hash)
    }

    pub fn get(&self, hash: &str) -> Option<&SeenMarker> {
        self.entries.get(hash)
    }

    /// Record `hash` unless already present. Returns true when it was new.
    pub fn insert_if_new(&mut self, hash: &str, file_name: &str) -> bool {
        if self.entries.contains_key(hash) {
            return false;
        }
        self.entries.insert(
            hash.to_string(),
            SeenMarker {
                file_name: file_name.to_string(),
                first_seen: Utc::now(),
            },
        );
        self.dirty = true;
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrite the index file if anything changed.
    pub fn save(&mut self) -> Result<(), IndexError> {
        if !self.dirty {
            return Ok(());
        }
        let io_err = |source| IndexError::Io {
            path: self.path.clone(),
            source,
        };
        let dir = self.path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir).map_err(io_err)?;

        let json = serde_json::to_vec_pretty(&self.entries).map_err(|source| IndexError::Json {
            path: self.path.clone(),
            source,
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(&json).map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        self.dirty = false;
        Ok(())
    }
}
