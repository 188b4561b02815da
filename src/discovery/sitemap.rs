//! Sitemap and robots.txt fallback.
//!
//! Used only when crawling found nothing: listed URLs on the seed host that
//! mention the topic get one non-recursive extraction pass each.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::debug;

use super::extract::extract;
use super::strategy::{DiscoveryContext, DiscoveryOutcome, DiscoveryStrategy};
use super::Vocabulary;
use crate::models::{CrawlTarget, DiscoveredResource};
use crate::scrapers::HttpClient;
use crate::utils::url::same_host;

/// Standard sitemap locations to check.
const SITEMAP_PATHS: &[&str] = &[
    "/sitemap.xml",
    "/sitemap_index.xml",
    "/wp-sitemap.xml",
    "/sitemap/sitemap.xml",
];

/// Sitemap documents fetched per site, indexes included.
const MAX_SITEMAPS: usize = 20;

/// `Sitemap:` directives from a robots.txt body.
pub fn robots_sitemaps(robots: &str) -> Vec<String> {
    robots
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (key, value) = line.split_once(':')?;
            if key.trim().eq_ignore_ascii_case("sitemap") {
                let value = value.trim();
                (!value.is_empty()).then(|| value.to_string())
            } else {
                None
            }
        })
        .collect()
}

/// `<loc>` values of a sitemap or sitemap index, entities unescaped.
pub fn extract_locs(xml: &str) -> Vec<String> {
    let mut locs = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find("<loc>") {
        rest = &rest[start + 5..];
        let Some(end) = rest.find("</loc>") else {
            break;
        };
        let url = rest[..end]
            .trim()
            .trim_start_matches("<![CDATA[")
            .trim_end_matches("]]>")
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'");
        if !url.is_empty() {
            locs.push(url);
        }
        rest = &rest[end + 6..];
    }
    locs
}

/// Page URLs from every sitemap reachable from `seeds`, following indexes.
async fn collect_sitemap_urls(http: &HttpClient, seeds: Vec<String>) -> Vec<String> {
    let mut pending = seeds;
    pending.reverse();
    let mut processed = HashSet::new();
    let mut urls = Vec::new();

    while let Some(sitemap_url) = pending.pop() {
        if processed.len() >= MAX_SITEMAPS || !processed.insert(sitemap_url.clone()) {
            continue;
        }
        let Ok(xml) = http.get_text(&sitemap_url).await else {
            continue;
        };
        if xml.contains("<sitemapindex") {
            for loc in extract_locs(&xml) {
                if !processed.contains(&loc) {
                    pending.push(loc);
                }
            }
        } else if xml.contains("<urlset") {
            urls.extend(extract_locs(&xml));
        }
    }
    urls
}

/// Sitemap URLs worth an extraction pass: same host, topical, capped.
pub fn select_candidates(root: &str, urls: Vec<String>, vocab: &Vocabulary, cap: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|u| same_host(root, u))
        .filter(|u| vocab.mentions_topic(u) && !vocab.is_blacklisted_url(u))
        .filter(|u| seen.insert(u.clone()))
        .take(cap)
        .collect()
}

/// Discovery strategy reading robots.txt and sitemaps.
pub struct SitemapFallback;

#[async_trait]
impl DiscoveryStrategy for SitemapFallback {
    fn name(&self) -> &str {
        "sitemap"
    }

    async fn discover(&self, target: &CrawlTarget, ctx: &DiscoveryContext) -> DiscoveryOutcome {
        let base = target.root_url.trim_end_matches('/');
        let mut seeds = match ctx.http.get_text(&format!("{}/robots.txt", base)).await {
            Ok(robots) => robots_sitemaps(&robots),
            Err(_) => Vec::new(),
        };
        seeds.extend(SITEMAP_PATHS.iter().map(|p| format!("{}{}", base, p)));

        let urls = collect_sitemap_urls(&ctx.http, seeds).await;
        let candidates = select_candidates(&target.root_url, urls, &ctx.vocabulary, ctx.crawl.sitemap_cap);
        debug!("{}: {} sitemap candidates", target.name, candidates.len());

        let mut resources: Vec<DiscoveredResource> = Vec::new();
        for url in candidates {
            if ctx.control.is_cancelled() {
                break;
            }
            if let Some(html) = ctx.http.fetch_page(&url).await {
                for resource in extract(&url, &html, &ctx.vocabulary) {
                    if !resources.contains(&resource) {
                        resources.push(resource);
                    }
                }
            }
        }
        DiscoveryOutcome::from_resources(resources)
    }
}
