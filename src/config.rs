//! Configuration management for ataquire.
//!
//! Settings come from a TOML file whose every field has a default, so a
//! missing file or an empty section is valid. The site list is a separate
//! TOML file of `[[site]]` tables.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::discovery::{ScoringTable, Vocabulary};
use crate::models::CrawlTarget;
use crate::scrapers::BrowserEngineConfig;

/// Errors raised while loading settings or the site list.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Crawl loop bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Maximum BFS depth below the root page.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    /// Maximum number of URLs marked visited per site.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Maximum sitemap URLs given an extraction pass.
    #[serde(default = "default_sitemap_cap")]
    pub sitemap_cap: usize,
    /// Seconds without discovery progress before the current URL is abandoned.
    #[serde(default = "default_stall_window")]
    pub stall_window_secs: u64,
}

fn default_max_depth() -> u32 {
    3
}

fn default_max_pages() -> usize {
    120
}

fn default_sitemap_cap() -> usize {
    40
}

fn default_stall_window() -> u64 {
    60
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_pages: default_max_pages(),
            sitemap_cap: default_sitemap_cap(),
            stall_window_secs: default_stall_window(),
        }
    }
}

impl CrawlConfig {
    pub fn stall_window(&self) -> Duration {
        Duration::from_secs(self.stall_window_secs)
    }
}

/// Static fetcher behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-attempt timeout in seconds.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
    /// Attempts per request.
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Lower bound of the randomized pause between attempts.
    #[serde(default = "default_backoff_min")]
    pub backoff_min_ms: u64,
    /// Upper bound of the randomized pause between attempts.
    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,
    /// Simultaneous in-flight requests allowed per host.
    #[serde(default = "default_per_host_limit")]
    pub per_host_limit: usize,
    /// Accept invalid or self-signed TLS certificates.
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,
    /// Identity pool; empty means the built-in browser user agents.
    #[serde(default)]
    pub user_agents: Vec<String>,
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
}

fn default_http_timeout() -> u64 {
    15
}

fn default_retries() -> u32 {
    3
}

fn default_backoff_min() -> u64 {
    1500
}

fn default_backoff_max() -> u64 {
    3000
}

fn default_per_host_limit() -> usize {
    2
}

fn default_true() -> bool {
    true
}

fn default_accept_language() -> String {
    "pt-BR,pt;q=0.9,en-US;q=0.8,en;q=0.7".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
            retries: default_retries(),
            backoff_min_ms: default_backoff_min(),
            backoff_max_ms: default_backoff_max(),
            per_host_limit: default_per_host_limit(),
            accept_invalid_certs: true,
            user_agents: Vec::new(),
            accept_language: default_accept_language(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Resolution and worker pool sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Sites processed concurrently.
    #[serde(default = "default_site_workers")]
    pub site_workers: usize,
    /// Concurrent resolutions within one site.
    #[serde(default = "default_resolve_workers")]
    pub resolve_workers: usize,
    /// Candidates followed when a direct URL answers with HTML.
    #[serde(default = "default_max_html_hops")]
    pub max_html_hops: usize,
}

fn default_site_workers() -> usize {
    4
}

fn default_resolve_workers() -> usize {
    6
}

fn default_max_html_hops() -> usize {
    8
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            site_workers: default_site_workers(),
            resolve_workers: default_resolve_workers(),
            max_html_hops: default_max_html_hops(),
        }
    }
}

/// Conventional folder/file listing API probed before crawling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Folder listing path relative to the site root.
    #[serde(default = "default_folders_path")]
    pub folders_path: String,
    /// File listing path; `{id}` is replaced with the folder id.
    #[serde(default = "default_files_path")]
    pub files_path: String,
}

fn default_folders_path() -> String {
    "api/folders".to_string()
}

fn default_files_path() -> String {
    "api/folders/{id}/files".to_string()
}

impl Default for RepositoryApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            folders_path: default_folders_path(),
            files_path: default_files_path(),
        }
    }
}

/// Top-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub crawl: CrawlConfig,
    pub http: HttpConfig,
    pub browser: BrowserEngineConfig,
    pub download: DownloadConfig,
    pub repository_api: RepositoryApiConfig,
    pub vocabulary: Vocabulary,
    /// Scoring override; derived from the vocabulary when absent.
    pub scoring: Option<ScoringTable>,
}

impl Settings {
    /// Load settings from a TOML file, falling back to defaults when the file is absent.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            debug!("Settings file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text, &path.display().to_string())
    }

    /// Parse settings from TOML text.
    pub fn from_toml(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.http.per_host_limit == 0 {
            return Err(ConfigError::Invalid("http.per_host_limit must be at least 1".into()));
        }
        if self.http.retries == 0 {
            return Err(ConfigError::Invalid("http.retries must be at least 1".into()));
        }
        if self.http.backoff_min_ms > self.http.backoff_max_ms {
            return Err(ConfigError::Invalid(
                "http.backoff_min_ms exceeds http.backoff_max_ms".into(),
            ));
        }
        if self.download.site_workers == 0 || self.download.resolve_workers == 0 {
            return Err(ConfigError::Invalid("worker pool sizes must be at least 1".into()));
        }
        // Blocking calls must time out before the stall watchdog fires.
        let window = self.crawl.stall_window_secs;
        if self.http.timeout_secs >= window
            || self.browser.timeout >= window
            || self.browser.script_timeout >= window
        {
            return Err(ConfigError::Invalid(format!(
                "timeouts must be shorter than the {}s stall window",
                window
            )));
        }
        Ok(())
    }

    /// Scoring table in effect.
    pub fn scoring_table(&self) -> ScoringTable {
        self.scoring
            .clone()
            .unwrap_or_else(|| ScoringTable::for_vocabulary(&self.vocabulary))
    }
}

#[derive(Debug, Deserialize)]
struct SiteList {
    #[serde(default, rename = "site")]
    sites: Vec<CrawlTarget>,
}

/// Load the ordered site list from a TOML file of `[[site]]` tables.
pub fn load_sites(path: &Path) -> Result<Vec<CrawlTarget>, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_sites(&text, &path.display().to_string())
}

/// Parse a site list from TOML text.
pub fn parse_sites(text: &str, origin: &str) -> Result<Vec<CrawlTarget>, ConfigError> {
    let list: SiteList = toml::from_str(text).map_err(|source| ConfigError::Parse {
        path: origin.to_string(),
        source,
    })?;

    let mut names = HashSet::new();
    let mut keys = HashSet::new();
    for site in &list.sites {
        if !names.insert(site.name.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "{}: duplicate site name {:?}",
                origin, site.name
            )));
        }
        if !keys.insert(site.key()) {
            return Err(ConfigError::Invalid(format!(
                "{}: site {:?} shares its output directory {} with another site",
                origin,
                site.name,
                site.key()
            )));
        }
    }
    Ok(list.sites)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_settings_use_defaults() {
        let settings = Settings::from_toml("", "inline").unwrap();
        assert_eq!(settings.crawl.max_depth, 3);
        assert_eq!(settings.crawl.max_pages, 120);
        assert_eq!(settings.http.per_host_limit, 2);
        assert!(settings.http.accept_invalid_certs);
        assert_eq!(settings.download.site_workers, 4);
        assert_eq!(settings.download.resolve_workers, 6);
        assert_eq!(settings.repository_api.files_path, "api/folders/{id}/files");
    }

    #[test]
    fn test_partial_sections() {
        let settings = Settings::from_toml(
            r#"
            [crawl]
            max_pages = 300

            [http]
            retries = 5

            [vocabulary]
            reject_keywords = ["balanco"]
            "#,
            "inline",
        )
        .unwrap();
        assert_eq!(settings.crawl.max_pages, 300);
        assert_eq!(settings.crawl.max_depth, 3);
        assert_eq!(settings.http.retries, 5);
        assert_eq!(settings.http.timeout_secs, 15);
        assert_eq!(settings.vocabulary.reject_keywords, vec!["balanco".to_string()]);
    }

    #[test]
    fn test_timeouts_must_undercut_stall_window() {
        let err = Settings::from_toml("[crawl]\nstall_window_secs = 10\n", "inline").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_scoring_override() {
        let settings = Settings::from_toml(
            r#"
            [scoring]
            year_bonus = 1
            hub_bonus = 2
            rules = [{ target = "text", keywords = ["ata"], weight = 3 }]
            "#,
            "inline",
        )
        .unwrap();
        let table = settings.scoring_table();
        assert_eq!(table.score("ata", "https://x.example/"), 3);
    }

    #[test]
    fn test_parse_sites() {
        let sites = parse_sites(
            r#"
            [[site]]
            name = "Instituto de Previdência"
            region = "SC"
            url = "https://inst.example/"

            [[site]]
            name = "Fundo Municipal"
            region = "PR"
            root_url = "https://fundo.example/"
            "#,
            "inline",
        )
        .unwrap();
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].root_url, "https://inst.example/");
        assert_eq!(sites[1].region, "PR");
    }

    #[test]
    fn test_duplicate_sites_are_rejected() {
        let same_name = parse_sites(
            r#"
            [[site]]
            name = "Instituto"
            region = "SC"
            url = "https://a.example/"

            [[site]]
            name = "Instituto"
            region = "PR"
            url = "https://b.example/"
            "#,
            "inline",
        );
        assert!(matches!(same_name, Err(ConfigError::Invalid(_))));

        let same_dir = parse_sites(
            r#"
            [[site]]
            name = "Fundo São José"
            region = "SC"
            url = "https://a.example/"

            [[site]]
            name = "Fundo Sao Jose"
            region = "sc"
            url = "https://b.example/"
            "#,
            "inline",
        );
        assert!(matches!(same_dir, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_settings_file_is_default() {
        let settings = Settings::load(Some(Path::new("/nonexistent/ataquire.toml"))).unwrap();
        assert_eq!(settings.crawl.max_depth, 3);
    }
}
