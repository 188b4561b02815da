//! Ordered discovery strategies for one site.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::control::CrawlControl;
use super::crawl::BfsCrawl;
use super::repository::RepositoryApiProbe;
use super::sitemap::SitemapFallback;
use super::{ScoringTable, Vocabulary};
use crate::config::{CrawlConfig, RepositoryApiConfig, Settings};
use crate::models::{CrawlTarget, DiscoveredResource};
use crate::scrapers::{HttpClient, RenderLauncher};

/// What a strategy concluded about a site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    /// Resources found; later strategies are not consulted.
    Found(Vec<DiscoveredResource>),
    /// Nothing found; defer to the next strategy.
    NoOpinion,
}

impl DiscoveryOutcome {
    /// `Found` when non-empty, `NoOpinion` otherwise.
    pub fn from_resources(resources: Vec<DiscoveredResource>) -> Self {
        if resources.is_empty() {
            Self::NoOpinion
        } else {
            Self::Found(resources)
        }
    }
}

/// Everything a strategy needs to discover one site.
#[derive(Clone)]
pub struct DiscoveryContext {
    pub http: HttpClient,
    pub vocabulary: Arc<Vocabulary>,
    pub scoring: Arc<ScoringTable>,
    pub crawl: CrawlConfig,
    pub repository_api: RepositoryApiConfig,
    /// Elements clicked per page by the render fallback.
    pub click_top: usize,
    /// Render fallback; `None` disables it.
    pub launcher: Option<Arc<dyn RenderLauncher>>,
    pub control: CrawlControl,
}

impl DiscoveryContext {
    pub fn new(
        http: HttpClient,
        settings: &Settings,
        launcher: Option<Arc<dyn RenderLauncher>>,
        control: CrawlControl,
    ) -> Self {
        let launcher = if settings.browser.enabled { launcher } else { None };
        Self {
            http,
            vocabulary: Arc::new(settings.vocabulary.clone()),
            scoring: Arc::new(settings.scoring_table()),
            crawl: settings.crawl.clone(),
            repository_api: settings.repository_api.clone(),
            click_top: settings.browser.click_top,
            launcher,
            control,
        }
    }
}

/// One way of discovering a site's resources.
#[async_trait]
pub trait DiscoveryStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn discover(&self, target: &CrawlTarget, ctx: &DiscoveryContext) -> DiscoveryOutcome;
}

/// Runs strategies in order and keeps the first `Found`.
pub struct SiteDiscovery {
    strategies: Vec<Box<dyn DiscoveryStrategy>>,
}

impl SiteDiscovery {
    pub fn new(strategies: Vec<Box<dyn DiscoveryStrategy>>) -> Self {
        Self { strategies }
    }

    /// Repository-API probe, then BFS crawl, then sitemap fallback.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(RepositoryApiProbe),
            Box::new(BfsCrawl),
            Box::new(SitemapFallback),
        ])
    }

    pub async fn discover(
        &self,
        target: &CrawlTarget,
        ctx: &DiscoveryContext,
    ) -> Vec<DiscoveredResource> {
        for strategy in &self.strategies {
            if ctx.control.is_cancelled() {
                break;
            }
            match strategy.discover(target, ctx).await {
                DiscoveryOutcome::Found(resources) => {
                    info!(
                        "{}: {} found {} resources",
                        target.name,
                        strategy.name(),
                        resources.len()
                    );
                    return resources;
                }
                DiscoveryOutcome::NoOpinion => {
                    debug!("{}: {} found nothing", target.name, strategy.name());
                }
            }
        }
        Vec::new()
    }
}

impl Default for SiteDiscovery {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        name: &'static str,
        outcome: DiscoveryOutcome,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DiscoveryStrategy for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn discover(&self, _: &CrawlTarget, _: &DiscoveryContext) -> DiscoveryOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    #[tokio::test]
    async fn test_first_found_wins() {
        let calls = Arc::new(AtomicUsize::new(0));
        let found = vec![DiscoveredResource::direct("https://a.example/ata.pdf")];
        let discovery = SiteDiscovery::new(vec![
            Box::new(Fixed {
                name: "empty",
                outcome: DiscoveryOutcome::NoOpinion,
                calls: calls.clone(),
            }),
            Box::new(Fixed {
                name: "hit",
                outcome: DiscoveryOutcome::Found(found.clone()),
                calls: calls.clone(),
            }),
            Box::new(Fixed {
                name: "never",
                outcome: DiscoveryOutcome::NoOpinion,
                calls: calls.clone(),
            }),
        ]);

        let settings = Settings::default();
        let http = HttpClient::new(&HttpConfig::default()).unwrap();
        let ctx = DiscoveryContext::new(http, &settings, None, CrawlControl::default());
        let target = CrawlTarget::new("A", "SC", "https://a.example/");

        assert_eq!(discovery.discover(&target, &ctx).await, found);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
