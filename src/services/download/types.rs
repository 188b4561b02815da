//! Resolution error and statistics types.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;

use crate::models::DownloadResult;
use crate::scrapers::FetchError;

/// A resource that reached a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Saved(DownloadResult),
    /// Identical content already exists in the site directory.
    Duplicate,
}

impl Resolved {
    pub fn into_saved(self) -> Option<DownloadResult> {
        match self {
            Resolved::Saved(result) => Some(result),
            Resolved::Duplicate => None,
        }
    }
}

/// Why a resource did not produce a saved file.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Network(#[from] FetchError),
    /// Payload does not match what its name or content type claims.
    #[error("malformed content from {url}: {reason}")]
    MalformedContent { url: String, reason: String },
    /// Filtered out by the plausibility or navigation rules.
    #[error("rejected {url}: {reason}")]
    Rejected { url: String, reason: String },
    /// Every strategy was tried without reaching a document.
    #[error("resolution exhausted for {0}")]
    Exhausted(String),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ResolveError {
    pub(crate) fn rejected(url: &str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(url: &str, reason: impl Into<String>) -> Self {
        Self::MalformedContent {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

/// Counters for one site's resolution phase.
#[derive(Debug, Default)]
pub struct ResolveStats {
    pub saved: AtomicUsize,
    pub duplicates: AtomicUsize,
    pub skipped: AtomicUsize,
    pub failed: AtomicUsize,
}

impl ResolveStats {
    pub fn snapshot(&self) -> (usize, usize, usize, usize) {
        (
            self.saved.load(Ordering::Relaxed),
            self.duplicates.load(Ordering::Relaxed),
            self.skipped.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
        )
    }
}
