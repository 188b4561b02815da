//! Resolution of direct URLs, with one hop through intermediate HTML.

use tracing::debug;

use super::types::{ResolveError, Resolved};
use super::Resolver;
use crate::discovery::{extract, is_hub, is_vendor_plugin_url, Vocabulary};
use crate::models::DiscoveredResource;
use crate::scrapers::HttpResponse;
use crate::utils::mime::{has_document_extension, is_binary_document_type, is_html_type};
use crate::utils::url::{host_of, query_pairs};

/// Hosts never fetched during resolution.
pub const SOCIAL_HOSTS: &[&str] = &[
    "facebook.com",
    "instagram.com",
    "twitter.com",
    "x.com",
    "linkedin.com",
    "whatsapp.com",
    "youtube.com",
    "wa.me",
];

/// Query keys that carry a file identifier.
pub const IDENTIFIER_KEYS: &[&str] = &["id", "codigo", "file", "arquivo", "doc"];

/// Query keys of listing navigation (category, period, pagination).
const NAVIGATION_KEYS: &[&str] = &["cat", "y", "m", "ano", "mes", "page", "p", "pagina"];

pub fn is_social_url(url: &str) -> bool {
    host_of(url).is_some_and(|host| {
        SOCIAL_HOSTS
            .iter()
            .any(|s| host == *s || host.ends_with(&format!(".{}", s)))
    })
}

/// Whether any query key is an identifier key.
pub fn has_identifier_key(url: &str) -> bool {
    query_pairs(url)
        .iter()
        .any(|(k, _)| IDENTIFIER_KEYS.contains(&k.as_str()))
}

/// Listing navigation rather than a document: navigation keys, no
/// identifier, no document extension. Hubs are exempt.
pub fn is_navigation_url(url: &str, vocab: &Vocabulary) -> bool {
    if has_document_extension(url) || is_hub(url, vocab) || is_vendor_plugin_url(url, vocab) {
        return false;
    }
    let pairs = query_pairs(url);
    pairs.iter().any(|(k, _)| NAVIGATION_KEYS.contains(&k.as_str()))
        && !pairs.iter().any(|(k, _)| IDENTIFIER_KEYS.contains(&k.as_str()))
}

/// How a response should be treated.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Payload {
    Document,
    Html,
    Unknown,
}

pub(super) fn classify(response: &HttpResponse) -> Payload {
    let content_type = response.content_type_or_empty();
    if is_binary_document_type(content_type) {
        Payload::Document
    } else if is_html_type(content_type) || response.looks_like_html() {
        Payload::Html
    } else if infer::get(&response.body).is_some_and(|t| {
        matches!(
            t.matcher_type(),
            infer::MatcherType::Doc | infer::MatcherType::Archive
        )
    }) {
        Payload::Document
    } else {
        Payload::Unknown
    }
}

impl Resolver {
    /// GET `url`; persist a document, or hop through HTML to the first document it links.
    pub(super) async fn resolve_direct(
        &self,
        url: &str,
        referer: Option<&str>,
    ) -> Result<Resolved, ResolveError> {
        if is_social_url(url) {
            return Err(ResolveError::rejected(url, "social media host"));
        }
        if is_navigation_url(url, &self.vocabulary) {
            return Err(ResolveError::rejected(url, "listing navigation"));
        }

        let response = match referer {
            Some(r) => self.http.get_with_referer(url, r).await?,
            None => self.http.get(url).await?,
        };
        match classify(&response) {
            Payload::Document => self.store.persist(&response, url, &self.vocabulary).await,
            Payload::Html => self
                .hop(&response)
                .await?
                .ok_or_else(|| ResolveError::Exhausted(url.to_string())),
            Payload::Unknown => Err(ResolveError::malformed(
                url,
                format!("unexpected content type {:?}", response.content_type_or_empty()),
            )),
        }
    }

    /// Follow up to `max_html_hops` direct candidates from an HTML page.
    ///
    /// `Ok(None)` when no candidate yielded a document.
    pub(super) async fn hop(
        &self,
        page: &HttpResponse,
    ) -> Result<Option<Resolved>, ResolveError> {
        let page_url = page.final_url.as_str();
        let html = page.text();
        let candidates: Vec<String> = extract(page_url, &html, &self.vocabulary)
            .into_iter()
            .filter_map(|r| match r {
                DiscoveredResource::Direct { url } => Some(url),
                DiscoveredResource::Deferred { .. } => None,
            })
            .filter(|u| u != page_url)
            .filter(|u| !is_social_url(u) && !is_navigation_url(u, &self.vocabulary))
            .take(self.max_html_hops)
            .collect();
        debug!("{} hop candidates on {}", candidates.len(), page_url);

        for candidate in candidates {
            let response = match self.http.get_with_referer(&candidate, page_url).await {
                Ok(r) => r,
                Err(e) => {
                    debug!("Hop candidate {} failed: {}", candidate, e);
                    continue;
                }
            };
            if classify(&response) != Payload::Document {
                continue;
            }
            match self.store.persist(&response, &candidate, &self.vocabulary).await {
                Ok(outcome) => return Ok(Some(outcome)),
                Err(ResolveError::Io { path, source }) => {
                    return Err(ResolveError::Io { path, source })
                }
                Err(e) => debug!("Hop candidate {} not saved: {}", candidate, e),
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_social_hosts() {
        assert!(is_social_url("https://www.facebook.com/inst"));
        assert!(is_social_url("https://x.com/inst"));
        assert!(!is_social_url("https://box.com/x"));
        assert!(!is_social_url("https://inst.example/download.php"));
    }

    #[test]
    fn test_navigation_urls() {
        let vocab = Vocabulary::default();
        assert!(is_navigation_url("https://a.example/atas.php?ano=2023", &vocab));
        assert!(is_navigation_url("https://a.example/lista?page=2", &vocab));
        assert!(!is_navigation_url("https://a.example/downloads.php?cat=7", &vocab));
        assert!(!is_navigation_url("https://a.example/ver.php?ano=2023&id=9", &vocab));
        assert!(!is_navigation_url("https://a.example/ata.pdf?page=1", &vocab));
        assert!(!is_navigation_url("https://a.example/ata", &vocab));
    }
}
