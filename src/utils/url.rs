//! URL resolution and host helpers.

use url::Url;

/// Resolve `href` against `base`, dropping non-navigable schemes.
///
/// Returns `None` for empty, fragment-only, `javascript:`, `mailto:` and `tel:` links.
pub fn resolve_href(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    let lower = href.to_lowercase();
    if href.is_empty()
        || href.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let base = Url::parse(base).ok()?;
    let joined = base.join(href).ok()?;
    match joined.scheme() {
        "http" | "https" => Some(joined.to_string()),
        _ => None,
    }
}

/// Host of a URL, lowercased.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

/// Whether two URLs share a host.
pub fn same_host(a: &str, b: &str) -> bool {
    match (host_of(a), host_of(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Canonical key for the visited set: fragment stripped.
pub fn normalize_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut u) => {
            u.set_fragment(None);
            u.to_string()
        }
        Err(_) => url.split('#').next().unwrap_or(url).to_string(),
    }
}

/// Query pairs with lowercased keys.
pub fn query_pairs(url: &str) -> Vec<(String, String)> {
    match Url::parse(url) {
        Ok(u) => u
            .query_pairs()
            .map(|(k, v)| (k.to_lowercase(), v.into_owned()))
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Lowercased path of a URL, empty when unparseable.
pub fn path_of(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_default()
}

/// Last non-empty path segment, percent-decoded.
pub fn last_path_segment(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .next_back()?
        .to_string();
    let decoded = urlencoding::decode(&segment)
        .map(|d| d.into_owned())
        .unwrap_or(segment);
    Some(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_href() {
        assert_eq!(
            resolve_href("https://a.example/atas/index.php", "ata-01.pdf").as_deref(),
            Some("https://a.example/atas/ata-01.pdf")
        );
        assert_eq!(
            resolve_href("https://a.example/x/", "/pagina?id=77").as_deref(),
            Some("https://a.example/pagina?id=77")
        );
        assert_eq!(resolve_href("https://a.example/", "javascript:void(0)"), None);
        assert_eq!(resolve_href("https://a.example/", "#top"), None);
        assert_eq!(resolve_href("https://a.example/", "mailto:x@a.example"), None);
    }

    #[test]
    fn test_same_host() {
        assert!(same_host("https://a.example/x", "http://A.example/y"));
        assert!(!same_host("https://a.example/x", "https://b.example/x"));
    }

    #[test]
    fn test_normalize_strips_fragment() {
        assert_eq!(
            normalize_url("https://a.example/page#section"),
            "https://a.example/page"
        );
    }

    #[test]
    fn test_last_path_segment_decodes() {
        assert_eq!(
            last_path_segment("https://a.example/docs/ata%2003.pdf?x=1").as_deref(),
            Some("ata 03.pdf")
        );
        assert_eq!(last_path_segment("https://a.example/"), None);
    }
}
