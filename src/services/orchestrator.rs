//! Concurrent per-site pipelines: discovery, then resolution.
//!
//! Sites run as independent tasks behind a semaphore. Each finished site
//! yields one [`SiteReport`] on the returned channel, in completion order.
//! A pipeline that panics is reported with an error; the others carry on.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::discovery::{ControlRegistry, CrawlControl, DiscoveryContext, SiteDiscovery};
use crate::models::{CrawlTarget, DiscoveredResource, DownloadResult, SiteReport};
use crate::scrapers::{ChromeLauncher, HttpClient, RenderLauncher};
use crate::services::download::{Resolver, SiteStore};

/// Runs site pipelines with shared HTTP state and controls.
#[derive(Clone)]
pub struct Orchestrator {
    settings: Arc<Settings>,
    http: HttpClient,
    launcher: Option<Arc<dyn RenderLauncher>>,
    output_dir: PathBuf,
    registry: ControlRegistry,
    shutdown: CancellationToken,
}

impl Orchestrator {
    /// Build an orchestrator writing under `output_dir`, with the Chrome
    /// render fallback when the browser is enabled.
    pub fn new(settings: Settings, output_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let http = HttpClient::new(&settings.http).context("building HTTP client")?;
        let launcher: Option<Arc<dyn RenderLauncher>> = if settings.browser.enabled {
            Some(Arc::new(ChromeLauncher::new(
                settings.browser.clone(),
                settings.vocabulary.topical_keywords.clone(),
            )))
        } else {
            None
        };
        Ok(Self {
            settings: Arc::new(settings),
            http,
            launcher,
            output_dir: output_dir.into(),
            registry: ControlRegistry::default(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Replace the render fallback.
    pub fn with_launcher(mut self, launcher: Option<Arc<dyn RenderLauncher>>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Controls of the sites currently crawling.
    pub fn registry(&self) -> ControlRegistry {
        self.registry.clone()
    }

    /// Cancelling this token stops every crawl at its next page.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run every target, at most `site_workers` at once.
    pub fn run(&self, targets: Vec<CrawlTarget>) -> mpsc::Receiver<SiteReport> {
        let (tx, rx) = mpsc::channel(targets.len().max(1));
        let semaphore = Arc::new(Semaphore::new(self.settings.download.site_workers.max(1)));
        let this = self.clone();

        tokio::spawn(async move {
            let mut pending = targets.into_iter();
            while let Some(target) = pending.next() {
                let permit = tokio::select! {
                    biased;
                    _ = this.shutdown.cancelled() => {
                        for target in std::iter::once(target).chain(pending.by_ref()) {
                            let mut report = SiteReport::empty(target);
                            report.errors.push("not started: run interrupted".to_string());
                            let _ = tx.send(report).await;
                        }
                        break;
                    }
                    permit = semaphore.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };
                let tx = tx.clone();
                let pipeline = this.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    let fallback = target.clone();
                    let started = Instant::now();
                    let report =
                        match tokio::spawn(async move { pipeline.run_site(target).await }).await {
                            Ok(report) => report,
                            Err(e) => {
                                error!("{}: pipeline aborted: {}", fallback.name, e);
                                let mut report = SiteReport::empty(fallback);
                                report.errors.push(format!("pipeline aborted: {}", e));
                                report.elapsed = started.elapsed();
                                report
                            }
                        };
                    let _ = tx.send(report).await;
                });
            }
        });
        rx
    }

    /// Full pipeline for one site. Errors end up in the report.
    pub async fn run_site(&self, target: CrawlTarget) -> SiteReport {
        let started = Instant::now();
        let mut report = SiteReport::empty(target.clone());
        info!("{}: starting {}", target.name, target.root_url);

        let store = match SiteStore::open(target.clone(), &self.output_dir) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!("{}: cannot open output directory: {}", target.name, e);
                report.errors.push(e.to_string());
                report.elapsed = started.elapsed();
                return report;
            }
        };

        let resources = self.discover(&target).await;
        report.discovered = resources.len();

        report.downloads = self.resolve_with(store.clone(), resources).await;
        if let Err(e) = store.save_index().await {
            warn!("{}: failed to save hash index: {}", target.name, e);
            report.errors.push(e.to_string());
        }

        report.elapsed = started.elapsed();
        info!(
            "{}: {} discovered, {} saved in {:.1}s",
            target.name,
            report.discovered,
            report.downloads.len(),
            report.elapsed.as_secs_f64()
        );
        report
    }

    /// Discovery phase only.
    pub async fn discover(&self, target: &CrawlTarget) -> Vec<DiscoveredResource> {
        let control = CrawlControl::new(self.shutdown.child_token());
        self.registry.register(&target.key(), control.handle());
        let ctx = DiscoveryContext::new(
            self.http.clone(),
            &self.settings,
            self.launcher.clone(),
            control,
        );
        let resources = SiteDiscovery::standard().discover(target, &ctx).await;
        self.registry.unregister(&target.key());
        resources
    }

    /// Resolution phase only, for resources discovered earlier.
    pub async fn resolve(
        &self,
        target: &CrawlTarget,
        resources: Vec<DiscoveredResource>,
    ) -> anyhow::Result<Vec<DownloadResult>> {
        let store = Arc::new(
            SiteStore::open(target.clone(), &self.output_dir)
                .with_context(|| format!("opening output directory for {}", target.name))?,
        );
        let downloads = self.resolve_with(store.clone(), resources).await;
        store
            .save_index()
            .await
            .with_context(|| format!("saving hash index for {}", target.name))?;
        Ok(downloads)
    }

    async fn resolve_with(
        &self,
        store: Arc<SiteStore>,
        resources: Vec<DiscoveredResource>,
    ) -> Vec<DownloadResult> {
        if resources.is_empty() {
            return Vec::new();
        }
        let resolver = Resolver::new(
            self.http.clone(),
            Arc::new(self.settings.vocabulary.clone()),
            store,
            self.settings.download.max_html_hops,
        )
        .with_cancel(self.shutdown.child_token());
        resolver
            .resolve_all(resources, self.settings.download.resolve_workers)
            .await
    }
}
