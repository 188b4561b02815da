//! Writing resolved payloads to a site directory, deduplicated by content hash.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::debug;

use super::types::{ResolveError, Resolved};
use crate::discovery::Vocabulary;
use crate::models::{CrawlTarget, DownloadResult};
use crate::scrapers::HttpResponse;
use crate::storage::{HashIndex, IndexError};
use crate::utils::mime::{extension_for_content_type, generic_filename, has_saved_extension};
use crate::utils::url::last_path_segment;

const MAX_NAME_LEN: usize = 120;

/// Keep alphanumerics and ` ._-`; trim and bound the length.
pub fn sanitize_filename(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-'))
        .collect();
    let trimmed = kept.trim().trim_matches('.');
    if trimmed.chars().count() <= MAX_NAME_LEN {
        return trimmed.to_string();
    }
    // keep the extension when truncating
    match trimmed.rsplit_once('.') {
        Some((stem, ext)) if ext.len() <= 5 => {
            let stem: String = stem.chars().take(MAX_NAME_LEN - ext.len() - 1).collect();
            format!("{}.{}", stem, ext)
        }
        _ => trimmed.chars().take(MAX_NAME_LEN).collect(),
    }
}

/// File name for a payload: Content-Disposition, then the URL's last path
/// segment, then a generic name for the content type, with an extension
/// appended when missing.
pub fn derive_filename(response: &HttpResponse) -> String {
    let content_type = response.content_type_or_empty();
    let mut name = response
        .content_disposition_filename()
        .map(|n| sanitize_filename(&n))
        .filter(|n| !n.is_empty())
        .or_else(|| {
            last_path_segment(&response.final_url)
                .map(|n| sanitize_filename(&n))
                .filter(|n| !n.is_empty())
        })
        .unwrap_or_else(|| generic_filename(content_type).to_string());

    if !has_saved_extension(&name) {
        let ext = extension_for_content_type(content_type)
            .or_else(|| infer::get(&response.body).map(|t| t.extension()));
        if let Some(ext) = ext {
            name = format!("{}.{}", name, ext);
        }
    }
    name
}

fn extension_of(name: &str) -> String {
    name.rsplit_once('.')
        .map(|(_, e)| e.to_lowercase())
        .unwrap_or_default()
}

fn looks_like_html(body: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&body[..body.len().min(512)]).to_lowercase();
    let head = head.trim_start();
    head.starts_with("<!doctype html") || head.starts_with("<html") || head.contains("<body")
}

/// Cheap check that the payload is what its name claims.
pub fn check_signature(name: &str, body: &[u8]) -> Result<(), String> {
    if body.is_empty() {
        return Err("empty payload".to_string());
    }
    match extension_of(name).as_str() {
        "pdf" => {
            let window = &body[..body.len().min(1024)];
            if infer::archive::is_pdf(body) || window.windows(4).any(|w| w == b"%PDF") {
                Ok(())
            } else {
                Err("no PDF header".to_string())
            }
        }
        "docx" | "xlsx" => {
            let mut archive =
                zip::ZipArchive::new(Cursor::new(body)).map_err(|e| format!("not a zip: {}", e))?;
            archive
                .by_name("[Content_Types].xml")
                .map(|_| ())
                .map_err(|_| "zip without [Content_Types].xml".to_string())
        }
        "doc" | "xls" | "odt" if looks_like_html(body) => {
            Err("HTML served as an office document".to_string())
        }
        _ => Ok(()),
    }
}

/// Lowercase hex SHA-256.
pub fn content_hash(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// `dir/name`, or `dir/stem_N.ext` for the first free N.
fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((s, e)) => (s, format!(".{}", e)),
        None => (name, String::new()),
    };
    (1..)
        .map(|n| dir.join(format!("{}_{}{}", stem, n, ext)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// One site's output directory and hash index.
pub struct SiteStore {
    target: CrawlTarget,
    dir: PathBuf,
    index: Mutex<HashIndex>,
}

impl SiteStore {
    /// Open `<base>/<region>/<slug>` and load its index.
    pub fn open(target: CrawlTarget, base: &Path) -> Result<Self, IndexError> {
        let dir = target.output_dir(base);
        std::fs::create_dir_all(&dir).map_err(|source| IndexError::Io {
            path: dir.clone(),
            source,
        })?;
        let index = HashIndex::load(&dir)?;
        Ok(Self {
            target,
            dir,
            index: Mutex::new(index),
        })
    }

    pub fn target(&self) -> &CrawlTarget {
        &self.target
    }

    pub async fn indexed(&self) -> usize {
        self.index.lock().await.len()
    }

    /// Persist a payload unless identical content is already saved here.
    pub async fn persist(
        &self,
        response: &HttpResponse,
        source_url: &str,
        vocab: &Vocabulary,
    ) -> Result<Resolved, ResolveError> {
        let name = derive_filename(response);
        if !vocab.is_plausible(&name) {
            return Err(ResolveError::rejected(source_url, format!("implausible name {}", name)));
        }
        check_signature(&name, &response.body)
            .map_err(|reason| ResolveError::malformed(source_url, reason))?;
        let hash = content_hash(&response.body);

        let mut index = self.index.lock().await;
        if index.contains(&hash) {
            debug!("Duplicate content from {} ({})", source_url, &hash[..12]);
            return Ok(Resolved::Duplicate);
        }
        let path = unique_path(&self.dir, &name);
        tokio::fs::write(&path, &response.body)
            .await
            .map_err(|source| ResolveError::Io {
                path: path.clone(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(name);
        index.insert_if_new(&hash, &file_name);
        drop(index);

        Ok(Resolved::Saved(DownloadResult {
            local_path: path,
            source_url: source_url.to_string(),
            site_name: self.target.name.clone(),
            region: self.target.region.clone(),
            content_hash: hash,
        }))
    }

    /// Rewrite the index file.
    pub async fn save_index(&self) -> Result<(), IndexError> {
        self.index.lock().await.save()
    }
}
