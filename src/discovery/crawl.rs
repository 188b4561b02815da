//! Bounded breadth-first crawl of one site.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::extract::{detail_record_id, extract, internal_links, is_vendor_plugin_url};
use super::frontier::Frontier;
use super::strategy::{DiscoveryContext, DiscoveryOutcome, DiscoveryStrategy};
use super::control::StallWatchdog;
use crate::models::{CrawlTarget, DiscoveredResource};
use crate::scrapers::{Clickable, RenderError, RenderLauncher, RenderSession};

/// What a crawl produced.
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    pub resources: Vec<DiscoveredResource>,
    pub pages_visited: usize,
    pub render_failures: usize,
}

/// Resources in first-seen order, without repeats.
#[derive(Default)]
struct Collected {
    seen: HashSet<DiscoveredResource>,
    ordered: Vec<DiscoveredResource>,
}

impl Collected {
    /// Add resources, returning how many were new.
    fn extend(&mut self, resources: impl IntoIterator<Item = DiscoveredResource>) -> usize {
        let before = self.ordered.len();
        for resource in resources {
            if self.seen.insert(resource.clone()) {
                self.ordered.push(resource);
            }
        }
        self.ordered.len() - before
    }
}

/// Lazily created render session, disabled for good after a fatal error.
enum SessionSlot {
    NotStarted,
    Active(Box<dyn RenderSession>),
    Disabled,
}

impl SessionSlot {
    async fn get(
        &mut self,
        launcher: Option<&dyn RenderLauncher>,
    ) -> Option<&mut (dyn RenderSession + 'static)> {
        if let SessionSlot::NotStarted = self {
            *self = match launcher {
                Some(launcher) => match launcher.launch().await {
                    Ok(session) => SessionSlot::Active(session),
                    Err(e) => {
                        warn!("Render fallback unavailable: {}", e);
                        SessionSlot::Disabled
                    }
                },
                None => SessionSlot::Disabled,
            };
        }
        match self {
            SessionSlot::Active(session) => Some(session.as_mut()),
            _ => None,
        }
    }

    fn is_active(&self) -> bool {
        matches!(self, SessionSlot::Active(_))
    }

    async fn disable(&mut self) {
        if let SessionSlot::Active(mut session) = std::mem::replace(self, SessionSlot::Disabled) {
            session.close().await;
        }
    }
}

/// Crawl a site from `root`, bounded by the context's depth and page budget.
pub async fn crawl_site(root: &str, ctx: &DiscoveryContext) -> CrawlOutcome {
    let vocab = ctx.vocabulary.as_ref();
    let table = ctx.scoring.as_ref();
    let mut frontier = Frontier::new(root, ctx.crawl.max_depth, ctx.crawl.max_pages);
    let mut found = Collected::default();
    let mut slot = SessionSlot::NotStarted;
    let mut render_failures = 0;
    let watchdog = StallWatchdog::spawn(&ctx.control, ctx.crawl.stall_window());

    while let Some(entry) = frontier.next() {
        if ctx.control.is_cancelled() {
            break;
        }
        let url = entry.url;
        if vocab.is_blacklisted_url(&url) {
            debug!("Skipping blacklisted {}", url);
            continue;
        }
        if is_vendor_plugin_url(&url, vocab) {
            if found.extend([DiscoveredResource::direct(url.as_str())]) > 0 {
                ctx.control.mark_progress();
            }
            continue;
        }
        if ctx.control.take_skip() {
            info!("Skipping {} on request", url);
            continue;
        }
        debug!("Crawling {} (depth {})", url, entry.depth);

        let mut page_found = 0;
        if let Some(id) = detail_record_id(&url, vocab) {
            page_found += found.extend([DiscoveredResource::deferred(url.as_str(), id)]);
        }

        let static_html = ctx.http.fetch_page(&url).await;
        if ctx.control.take_skip() {
            info!("Abandoning {} on request", url);
            continue;
        }
        let static_resources = static_html
            .as_deref()
            .map(|html| extract(&url, html, vocab))
            .unwrap_or_default();
        let static_empty = static_resources.is_empty();
        page_found += found.extend(static_resources);

        let mut rendered_html = None;
        if static_empty && vocab.is_promising_url(&url) {
            if let Some(session) = slot.get(ctx.launcher.as_deref()).await {
                let mut dynamic = Vec::new();
                match render_and_collect(session, &url, ctx, &mut dynamic).await {
                    Ok(html) => rendered_html = Some(html),
                    Err(e) => {
                        warn!("Render fallback failed on {}: {}", url, e);
                        render_failures += 1;
                        slot.disable().await;
                    }
                }
                page_found += found.extend(dynamic);
            }
        }

        if page_found > 0 {
            ctx.control.mark_progress();
        }

        let link_source = match (static_html, rendered_html) {
            (Some(html), _) => Some(html),
            (None, Some(html)) => Some(html),
            (None, None) if slot.is_active() => match slot.get(None).await {
                Some(session) => match session.render(&url).await {
                    Ok(html) => Some(html),
                    Err(e) => {
                        debug!("Render for links failed on {}: {}", url, e);
                        if e.is_fatal() {
                            render_failures += 1;
                            slot.disable().await;
                        }
                        None
                    }
                },
                None => None,
            },
            (None, None) => None,
        };

        if let Some(html) = link_source {
            for link in internal_links(&url, &html, vocab, table) {
                frontier.enqueue(&link.url, entry.depth + 1);
            }
        }
    }

    slot.disable().await;
    watchdog.stop().await;

    let outcome = CrawlOutcome {
        pages_visited: frontier.visited_count(),
        resources: found.ordered,
        render_failures,
    };
    report_crawl_results(root, &outcome);
    outcome
}

/// Render, expand and click through one page, extracting after each step.
///
/// Resources found before a failure stay in `out`.
async fn render_and_collect(
    session: &mut dyn RenderSession,
    url: &str,
    ctx: &DiscoveryContext,
    out: &mut Vec<DiscoveredResource>,
) -> Result<String, RenderError> {
    let vocab = ctx.vocabulary.as_ref();
    let table = ctx.scoring.as_ref();

    let html = session.render(url).await?;
    out.extend(extract(url, &html, vocab));

    let expanded = session.expand().await?;
    out.extend(extract(url, &expanded, vocab));

    let rank = |c: &Clickable| -> Option<i32> {
        if vocab.is_nav_rejected(&c.text, &c.href) {
            None
        } else {
            Some(table.score(&c.text, &c.href))
        }
    };
    for page in session.click_top_candidates(ctx.click_top, &rank).await? {
        out.extend(extract(url, &page, vocab));
    }

    Ok(html)
}

fn report_crawl_results(root: &str, outcome: &CrawlOutcome) {
    if outcome.render_failures > 0 {
        warn!(
            "Crawl of {} complete with errors: {} pages visited, {} resources found, {} render failures",
            root,
            outcome.pages_visited,
            outcome.resources.len(),
            outcome.render_failures
        );
    } else {
        info!(
            "Crawl of {} complete: {} pages visited, {} resources found",
            root,
            outcome.pages_visited,
            outcome.resources.len()
        );
    }
}

/// The breadth-first crawl as a discovery strategy.
pub struct BfsCrawl;

#[async_trait]
impl DiscoveryStrategy for BfsCrawl {
    fn name(&self) -> &str {
        "crawl"
    }

    async fn discover(&self, target: &CrawlTarget, ctx: &DiscoveryContext) -> DiscoveryOutcome {
        DiscoveryOutcome::from_resources(crawl_site(&target.root_url, ctx).await.resources)
    }
}
