//! Resolution and download engine.
//!
//! Turns discovered resources into saved, deduplicated documents. Direct
//! URLs are fetched (hopping once through HTML when needed); deferred
//! detail records are resolved by harvesting and probing download handlers.
//! All writes for a site go through its [`SiteStore`].

mod deferred;
mod direct;
mod persist;
mod types;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::discovery::Vocabulary;
use crate::models::{DiscoveredResource, DownloadResult};
use crate::scrapers::HttpClient;

pub use deferred::{harvest_endpoints, payload_variants};
pub use direct::{has_identifier_key, is_navigation_url, is_social_url, IDENTIFIER_KEYS, SOCIAL_HOSTS};
pub use persist::{check_signature, content_hash, derive_filename, sanitize_filename, SiteStore};
pub use types::{ResolveError, ResolveStats, Resolved};

/// Resolves resources for one site.
///
/// Cloning is cheap; clones share the store and counters.
#[derive(Clone)]
pub struct Resolver {
    http: HttpClient,
    vocabulary: Arc<Vocabulary>,
    store: Arc<SiteStore>,
    max_html_hops: usize,
    stats: Arc<ResolveStats>,
    cancel: CancellationToken,
}

impl Resolver {
    pub fn new(
        http: HttpClient,
        vocabulary: Arc<Vocabulary>,
        store: Arc<SiteStore>,
        max_html_hops: usize,
    ) -> Self {
        Self {
            http,
            vocabulary,
            store,
            max_html_hops,
            stats: Arc::new(ResolveStats::default()),
            cancel: CancellationToken::new(),
        }
    }

    /// Stop starting new resolutions once `cancel` fires; in-flight ones finish.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn store(&self) -> &SiteStore {
        &self.store
    }

    pub fn stats(&self) -> &ResolveStats {
        &self.stats
    }

    /// Resolve one resource to a newly saved document.
    ///
    /// `None` covers duplicates as well as every failure; failures are
    /// logged here and never propagate.
    pub async fn resolve(&self, resource: &DiscoveredResource) -> Option<DownloadResult> {
        let outcome = match resource {
            DiscoveredResource::Direct { url } => self.resolve_direct(url, None).await,
            DiscoveredResource::Deferred {
                page_url,
                record_id,
            } => self.resolve_deferred(page_url, record_id).await,
        };

        match outcome {
            Ok(Resolved::Saved(result)) => {
                self.stats.saved.fetch_add(1, Ordering::Relaxed);
                debug!("Saved {} -> {}", result.source_url, result.local_path.display());
                Some(result)
            }
            Ok(Resolved::Duplicate) => {
                self.stats.duplicates.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                match &e {
                    ResolveError::Exhausted(_) | ResolveError::Io { .. } => {
                        self.stats.failed.fetch_add(1, Ordering::Relaxed);
                        warn!("Abandoned {}: {}", resource, e);
                    }
                    ResolveError::Network(_) => {
                        self.stats.failed.fetch_add(1, Ordering::Relaxed);
                        debug!("Network failure for {}: {}", resource, e);
                    }
                    ResolveError::MalformedContent { .. } | ResolveError::Rejected { .. } => {
                        self.stats.skipped.fetch_add(1, Ordering::Relaxed);
                        debug!("Skipped {}: {}", resource, e);
                    }
                }
                None
            }
        }
    }

    /// Resolve many resources with at most `workers` in flight.
    pub async fn resolve_all(
        &self,
        resources: Vec<DiscoveredResource>,
        workers: usize,
    ) -> Vec<DownloadResult> {
        let total = resources.len();
        let results: Vec<DownloadResult> = stream::iter(resources)
            .take_until(self.cancel.cancelled())
            .map(|resource| async move { self.resolve(&resource).await })
            .buffer_unordered(workers.max(1))
            .filter_map(|r| async move { r })
            .collect()
            .await;

        if self.cancel.is_cancelled() {
            warn!("{}: resolution stopped by shutdown", self.store.target().name);
        }
        let (saved, duplicates, skipped, failed) = self.stats.snapshot();
        info!(
            "{}: {} resources, {} saved, {} duplicates, {} skipped, {} failed",
            self.store.target().name,
            total,
            saved,
            duplicates,
            skipped,
            failed
        );
        results
    }
}
