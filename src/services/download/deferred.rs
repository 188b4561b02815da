//! Resolution of detail pages that gate a document behind a form submission.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use super::direct::{classify, has_identifier_key, is_social_url, Payload, IDENTIFIER_KEYS};
use super::types::{ResolveError, Resolved};
use super::Resolver;
use crate::utils::url::{query_pairs, resolve_href};

static FORM_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("form[action]").unwrap());

/// Quoted strings mentioning `download` (handler calls, data attributes).
static QUOTED_DOWNLOAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)["']([^"'\s]*download[^"'\s]*)["']"#).unwrap());

/// `location = '...'` and `location.href = '...'` assignments.
static LOCATION_ASSIGN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)location(?:\.href)?\s*=\s*["']([^"']+)["']"#).unwrap());

/// Absolute URLs mentioning `download` or `baixar`.
static ABSOLUTE_DOWNLOAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[^"'\s<>]+(?:download|baixar)[^"'\s<>]*"#).unwrap()
});

/// Handler basenames tried relative to the page's directory.
const CONVENTIONAL_ENDPOINTS: &[&str] = &[
    "downloads.php",
    "download.php",
    "downloadsget.php",
    "baixar.php",
    "getfile.php",
];

/// Candidate download endpoints on a detail page, in harvest order.
///
/// Social hosts are dropped, as are endpoints whose query has no identifier key.
pub fn harvest_endpoints(page_url: &str, html: &str) -> Vec<String> {
    let mut raw: Vec<String> = Vec::new();

    let document = Html::parse_document(html);
    for form in document.select(&FORM_SELECTOR) {
        if let Some(action) = form.value().attr("action") {
            raw.extend(resolve_href(page_url, action));
        }
    }
    for cap in QUOTED_DOWNLOAD.captures_iter(html) {
        if cap[1].to_lowercase().contains(".php") {
            raw.extend(resolve_href(page_url, &cap[1]));
        }
    }
    for cap in LOCATION_ASSIGN.captures_iter(html) {
        if cap[1].to_lowercase().contains(".php") {
            raw.extend(resolve_href(page_url, &cap[1]));
        }
    }
    for m in ABSOLUTE_DOWNLOAD.find_iter(html) {
        raw.push(m.as_str().replace("&amp;", "&"));
    }
    for name in CONVENTIONAL_ENDPOINTS {
        raw.extend(resolve_href(page_url, name));
    }

    let mut endpoints: Vec<String> = Vec::new();
    for endpoint in raw {
        let has_query = !query_pairs(&endpoint).is_empty();
        if is_social_url(&endpoint) || (has_query && !has_identifier_key(&endpoint)) {
            continue;
        }
        if !endpoints.contains(&endpoint) {
            endpoints.push(endpoint);
        }
    }
    endpoints
}

/// Form payloads tried against each endpoint, in order.
pub fn payload_variants(record_id: &str) -> Vec<Vec<(String, String)>> {
    let field = |k: &str, v: &str| (k.to_string(), v.to_string());
    vec![
        vec![field("id", record_id)],
        vec![field("codigo", record_id)],
        vec![field("file", record_id)],
        vec![field("arquivo", record_id)],
        vec![field("doc", record_id)],
        vec![field("op", "download"), field("codigo", record_id)],
        vec![field("acao", "download"), field("codigo", record_id)],
    ]
}

/// Whether the page URL already names the record in an identifier key.
fn names_record(page_url: &str, record_id: &str) -> bool {
    query_pairs(page_url)
        .iter()
        .any(|(k, v)| IDENTIFIER_KEYS.contains(&k.as_str()) && v == record_id)
}

impl Resolver {
    pub(super) async fn resolve_deferred(
        &self,
        page_url: &str,
        record_id: &str,
    ) -> Result<Resolved, ResolveError> {
        if names_record(page_url, record_id) {
            match self.resolve_direct(page_url, None).await {
                Err(ResolveError::Exhausted(_)) | Err(ResolveError::MalformedContent { .. }) => {
                    debug!("{} is not served directly, trying its endpoints", page_url);
                }
                other => return other,
            }
        }

        let page = self.http.get(page_url).await?;
        let html = page.text();
        let endpoints = harvest_endpoints(page_url, &html);
        debug!("{} endpoints harvested from {}", endpoints.len(), page_url);

        let payloads = payload_variants(record_id);
        for endpoint in &endpoints {
            for payload in &payloads {
                let response = match self.http.post_form(endpoint, payload, Some(page_url)).await {
                    Ok(r) => r,
                    Err(e) => {
                        debug!("POST {} failed: {}", endpoint, e);
                        continue;
                    }
                };
                if classify(&response) != Payload::Document {
                    continue;
                }
                match self.store.persist(&response, endpoint, &self.vocabulary).await {
                    Ok(outcome) => return Ok(outcome),
                    Err(e @ ResolveError::Io { .. }) => return Err(e),
                    Err(e) => debug!("Payload from {} not saved: {}", endpoint, e),
                }
            }
        }

        // Some detail pages link the file directly after all.
        match self.hop(&page).await? {
            Some(outcome) => Ok(outcome),
            None => Err(ResolveError::Exhausted(format!("{}|{}", page_url, record_id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harvest_order_and_filters() {
        let html = r#"
            <form action="download.php" method="post"><input name="id" value="77"></form>
            <a onclick="baixar('/arquivos/download_arquivo.php?codigo=77')">Baixar</a>
            <script>function go(){ location.href = 'ver.php?page=2'; }</script>
            <a href="https://facebook.com/share?download=1">f</a>
            <a href="https://cdn.example/baixar/77">b</a>
        "#;
        let endpoints = harvest_endpoints("https://inst.example/rpps/pagina.php?id=77", html);
        assert_eq!(
            endpoints,
            vec![
                "https://inst.example/rpps/download.php".to_string(),
                "https://inst.example/arquivos/download_arquivo.php?codigo=77".to_string(),
                "https://cdn.example/baixar/77".to_string(),
                "https://inst.example/rpps/downloads.php".to_string(),
                "https://inst.example/rpps/downloadsget.php".to_string(),
                "https://inst.example/rpps/baixar.php".to_string(),
                "https://inst.example/rpps/getfile.php".to_string(),
            ]
        );
    }

    #[test]
    fn test_payload_variants_order() {
        let payloads = payload_variants("77");
        assert_eq!(payloads.len(), 7);
        assert_eq!(payloads[0], vec![("id".to_string(), "77".to_string())]);
        assert_eq!(payloads[6][0], ("acao".to_string(), "download".to_string()));
    }

    #[test]
    fn test_names_record() {
        assert!(names_record("https://a.example/ver.php?id=9", "9"));
        assert!(names_record("https://a.example/ver.php?codigo=9&x=1", "9"));
        assert!(!names_record("https://a.example/pagina?id=10", "9"));
    }
}
