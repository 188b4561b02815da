//! HTTP response wrapper.

use std::collections::HashMap;

use reqwest::StatusCode;

/// Fully-read HTTP response.
///
/// The body is read while the host permit is held, so the permit covers the
/// whole exchange.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    /// URL after redirects.
    pub final_url: String,
    /// Header names are lowercased.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Get the Content-Type header.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(|s| s.as_str())
    }

    /// Content-Type or the empty string.
    pub fn content_type_or_empty(&self) -> &str {
        self.content_type().unwrap_or("")
    }

    /// Get the filename from Content-Disposition header.
    pub fn content_disposition_filename(&self) -> Option<String> {
        self.headers
            .get("content-disposition")
            .and_then(|h| parse_content_disposition_filename(h))
    }

    /// Whether the body looks like HTML regardless of the declared type.
    pub fn looks_like_html(&self) -> bool {
        if self
            .content_type()
            .map(crate::utils::mime::is_html_type)
            .unwrap_or(false)
        {
            return true;
        }
        let head = &self.body[..self.body.len().min(256)];
        let head = String::from_utf8_lossy(head).to_lowercase();
        head.contains("<html") || head.contains("<!doctype html")
    }

    /// Body decoded as text, lossy.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Parse filename from Content-Disposition header value.
/// Parses both `filename="name.pdf"` and `filename*=UTF-8''name.pdf` formats.
pub fn parse_content_disposition_filename(header: &str) -> Option<String> {
    // RFC 5987 form wins when both are present
    if let Some(start) = header.find("filename*=") {
        let rest = &header[start + 10..];
        if let Some(quote_start) = rest.find("''") {
            let encoded = rest[quote_start + 2..].split([';', ' ']).next()?;
            if let Ok(decoded) = urlencoding::decode(encoded.trim_matches('"')) {
                let filename = decoded.trim().to_string();
                if !filename.is_empty() {
                    return Some(filename);
                }
            }
        }
    }

    if let Some(start) = header.find("filename=") {
        let rest = &header[start + 9..];
        let filename = if let Some(quoted) = rest.strip_prefix('"') {
            quoted.split('"').next()
        } else if let Some(quoted) = rest.strip_prefix('\'') {
            quoted.split('\'').next()
        } else {
            rest.split([';', ' ']).next()
        };

        if let Some(name) = filename {
            let name = name.trim();
            let name = urlencoding::decode(name)
                .map(|d| d.into_owned())
                .unwrap_or_else(|_| name.to_string());
            if !name.is_empty() {
                return Some(name);
            }
        }
    }

    None
}
