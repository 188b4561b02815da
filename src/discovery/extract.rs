//! Document and hub extraction from HTML.
//!
//! [`extract`] is a pure function from a page URL and its HTML to the
//! resources worth resolving. [`internal_links`] produces the scored
//! same-host links the crawl loop may follow.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::scoring::{ScoredLink, ScoringTable};
use super::vocabulary::Vocabulary;
use crate::models::DiscoveredResource;
use crate::utils::mime::has_document_extension;
use crate::utils::url::{last_path_segment, normalize_url, path_of, query_pairs, resolve_href, same_host};

static ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static EMBED_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("iframe, embed, object").unwrap());

/// Absolute document URLs quoted in scripts or attributes.
static INLINE_DOC_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)["'](https?://[^"'\s<>]+?\.(?:pdf|docx?|xlsx?))["']"#).unwrap()
});

/// Any quoted `href` value in raw markup, including markup built inside scripts.
static RAW_HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#).unwrap());

/// Ordered, identity-deduplicated output buffer.
#[derive(Default)]
struct Found {
    seen: HashSet<DiscoveredResource>,
    items: Vec<DiscoveredResource>,
}

impl Found {
    fn push(&mut self, resource: DiscoveredResource) {
        if self.seen.insert(resource.clone()) {
            self.items.push(resource);
        }
    }
}

/// Visible text of an element with whitespace collapsed.
fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether a URL uses the download-manager plugin convention (`?wpdmdl=<digits>`).
pub fn is_vendor_plugin_url(url: &str, vocab: &Vocabulary) -> bool {
    query_pairs(url).iter().any(|(k, v)| {
        *k == vocab.vendor_plugin_param && !v.is_empty() && v.chars().all(|c| c.is_ascii_digit())
    })
}

/// Whether a URL looks like a download hub: a hub path token plus a category query key.
pub fn is_hub(url: &str, vocab: &Vocabulary) -> bool {
    if has_document_extension(url) {
        return false;
    }
    let path = path_of(url);
    let path_hit = vocab.hub_path_tokens.iter().any(|t| path.contains(t.as_str()));
    if !path_hit {
        return false;
    }
    query_pairs(url)
        .iter()
        .any(|(k, _)| vocab.hub_query_keys.iter().any(|q| q == k))
}

/// Numeric record identifier of a detail page.
///
/// Requires a numeric identifier parameter, no category parameter and a
/// path without a document extension.
pub fn detail_record_id(url: &str, vocab: &Vocabulary) -> Option<String> {
    if has_document_extension(url) {
        return None;
    }
    let pairs = query_pairs(url);
    if pairs.iter().any(|(k, _)| is_category_key(k, vocab)) {
        return None;
    }
    numeric_param(&pairs, &vocab.record_id_key)
}

fn numeric_param(pairs: &[(String, String)], key: &str) -> Option<String> {
    pairs
        .iter()
        .find(|(k, v)| k == key && !v.is_empty() && v.chars().all(|c| c.is_ascii_digit()))
        .map(|(_, v)| v.clone())
}

/// Whether the page is a category listing on a downloads hub (`downloads.php?cat=N`).
fn is_category_listing(url: &str, vocab: &Vocabulary) -> bool {
    path_of(url).contains("download")
        && query_pairs(url).iter().any(|(k, _)| is_category_key(k, vocab))
}

fn is_category_key(key: &str, vocab: &Vocabulary) -> bool {
    vocab.category_keys.iter().any(|c| c == key)
}

/// Extract candidate resources from a page.
///
/// Output is deduplicated by identity and keeps first-seen order.
pub fn extract(page_url: &str, html: &str, vocab: &Vocabulary) -> Vec<DiscoveredResource> {
    let mut found = Found::default();
    if html.trim().is_empty() {
        return found.items;
    }

    let document = Html::parse_document(html);
    // URLs rejected by name or text must not come back through the inline scan.
    let mut rejected: HashSet<String> = HashSet::new();
    let listing = is_category_listing(page_url, vocab);

    for anchor in document.select(&ANCHOR_SELECTOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve_href(page_url, href) else {
            continue;
        };

        if is_vendor_plugin_url(&url, vocab) {
            found.push(DiscoveredResource::direct(url));
            continue;
        }
        if vocab.is_blacklisted_url(&url) {
            continue;
        }

        let text = element_text(&anchor);
        if has_document_extension(&url) {
            let file_name = last_path_segment(&url).unwrap_or_default();
            if vocab.is_plausible(&file_name) && vocab.is_plausible(&text) {
                found.push(DiscoveredResource::direct(url));
            } else {
                rejected.insert(url);
            }
            continue;
        }

        if listing {
            if let Some(id) = numeric_param(&query_pairs(&url), &vocab.record_id_key) {
                found.push(DiscoveredResource::deferred(url, id));
                continue;
            }
        }

        if let Some(id) = detail_record_id(&url, vocab) {
            found.push(DiscoveredResource::deferred(url, id));
            continue;
        }

        if is_hub(&url, vocab) {
            found.push(DiscoveredResource::direct(url));
            continue;
        }

        let lower = url.to_lowercase();
        if (lower.contains("download") || lower.contains("arquivo"))
            && vocab.mentions_topic(&format!("{} {}", text, url))
        {
            found.push(DiscoveredResource::direct(url));
        }
    }

    for embed in document.select(&EMBED_SELECTOR) {
        let src = embed.value().attr("src").or_else(|| embed.value().attr("data"));
        let Some(url) = src.and_then(|s| resolve_href(page_url, s)) else {
            continue;
        };
        if vocab.is_blacklisted_url(&url) {
            continue;
        }
        if has_document_extension(&url) {
            let file_name = last_path_segment(&url).unwrap_or_default();
            if vocab.is_plausible(&file_name) {
                found.push(DiscoveredResource::direct(url));
            }
        } else if is_hub(&url, vocab) || url.to_lowercase().contains("download") {
            found.push(DiscoveredResource::direct(url));
        }
    }

    for capture in INLINE_DOC_URL.captures_iter(html) {
        let url = capture[1].to_string();
        if rejected.contains(&url) || vocab.is_blacklisted_url(&url) {
            continue;
        }
        let file_name = last_path_segment(&url).unwrap_or_default();
        if vocab.is_plausible(&file_name) {
            found.push(DiscoveredResource::direct(url));
        }
    }

    if is_hub(page_url, vocab) {
        found.push(DiscoveredResource::direct(page_url));
    }

    for capture in RAW_HREF.captures_iter(html) {
        if let Some(url) = resolve_href(page_url, &capture[1]) {
            if is_vendor_plugin_url(&url, vocab) {
                found.push(DiscoveredResource::direct(url));
            }
        }
    }

    found.items
}

/// Same-host links worth following, scored and in page order.
///
/// Blacklisted URLs, document files and detail pages are excluded: documents
/// and detail pages are handled by [`extract`], never crawled as pages.
pub fn internal_links(
    page_url: &str,
    html: &str,
    vocab: &Vocabulary,
    table: &ScoringTable,
) -> Vec<ScoredLink> {
    let mut links = Vec::new();
    if html.trim().is_empty() {
        return links;
    }

    let document = Html::parse_document(html);
    let mut seen: HashSet<String> = HashSet::new();

    for anchor in document.select(&ANCHOR_SELECTOR) {
        let Some(url) = anchor
            .value()
            .attr("href")
            .and_then(|h| resolve_href(page_url, h))
        else {
            continue;
        };
        let url = normalize_url(&url);

        if !same_host(page_url, &url)
            || vocab.is_blacklisted_url(&url)
            || has_document_extension(&url)
            || detail_record_id(&url, vocab).is_some()
        {
            continue;
        }

        let text = element_text(&anchor);
        let mut score = table.score(&text, &url);
        if is_hub(&url, vocab) {
            score += table.hub_bonus;
        }
        if score <= 0 || !seen.insert(url.clone()) {
            continue;
        }
        links.push(ScoredLink { url, text, score });
    }

    links
}
