//! Discovered resource references.

use std::fmt;
use std::str::FromStr;

/// Scheme prefix of the deferred-resolution token.
pub const DETAIL_SCHEME: &str = "detail://";

/// A reference produced by discovery and consumed by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DiscoveredResource {
    /// A URL expected to serve the document (or a hub leading to it) on GET.
    Direct { url: String },
    /// A detail page gating the document behind a follow-up submission.
    Deferred { page_url: String, record_id: String },
}

impl DiscoveredResource {
    pub fn direct(url: impl Into<String>) -> Self {
        Self::Direct { url: url.into() }
    }

    pub fn deferred(page_url: impl Into<String>, record_id: impl Into<String>) -> Self {
        Self::Deferred {
            page_url: page_url.into(),
            record_id: record_id.into(),
        }
    }

    /// The URL the resolver starts from.
    pub fn url(&self) -> &str {
        match self {
            Self::Direct { url } => url,
            Self::Deferred { page_url, .. } => page_url,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred { .. })
    }
}

/// Renders the token form: plain URL for direct resources,
/// `detail://<page-url>|<record-id>` for deferred ones.
impl fmt::Display for DiscoveredResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct { url } => f.write_str(url),
            Self::Deferred {
                page_url,
                record_id,
            } => write!(f, "{}{}|{}", DETAIL_SCHEME, page_url, record_id),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseResourceError {
    #[error("empty resource token")]
    Empty,
    #[error("malformed detail token: {0}")]
    MalformedDetail(String),
}

impl FromStr for DiscoveredResource {
    type Err = ParseResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseResourceError::Empty);
        }

        let Some(raw) = s.strip_prefix(DETAIL_SCHEME) else {
            return Ok(Self::direct(s));
        };

        // Record ids never contain '|', page URLs occasionally do.
        let (page_url, record_id) = raw
            .rsplit_once('|')
            .ok_or_else(|| ParseResourceError::MalformedDetail(s.to_string()))?;
        if page_url.is_empty() || record_id.is_empty() {
            return Err(ParseResourceError::MalformedDetail(s.to_string()));
        }
        Ok(Self::deferred(page_url, record_id))
    }
}
