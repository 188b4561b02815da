//! Download and per-site result models.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::CrawlTarget;

/// A document persisted to disk.
///
/// Created once on successful persistence, immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResult {
    pub local_path: PathBuf,
    pub source_url: String,
    pub site_name: String,
    pub region: String,
    /// Hex-encoded SHA-256 of the file content.
    pub content_hash: String,
}

/// Outcome of one site's full pipeline.
#[derive(Debug, Clone)]
pub struct SiteReport {
    pub target: CrawlTarget,
    /// Number of resources discovery produced.
    pub discovered: usize,
    pub downloads: Vec<DownloadResult>,
    /// Errors absorbed at the site boundary.
    pub errors: Vec<String>,
    pub elapsed: Duration,
}

impl SiteReport {
    pub fn empty(target: CrawlTarget) -> Self {
        Self {
            target,
            discovered: 0,
            downloads: Vec::new(),
            errors: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}
