//! Browser engine configuration types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Browser engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserEngineConfig {
    /// Allow the dynamic render fallback at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Run in headless mode (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Page load timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Per-script evaluation timeout in seconds.
    #[serde(default = "default_script_timeout")]
    pub script_timeout: u64,

    /// Pause after each interaction, in milliseconds.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Number of top-scored elements clicked per page.
    #[serde(default = "default_click_top")]
    pub click_top: usize,

    /// Scroll iterations while waiting for the page height to settle.
    #[serde(default = "default_max_scrolls")]
    pub max_scrolls: usize,

    /// "Next page" activations per page.
    #[serde(default = "default_max_next_pages")]
    pub max_next_pages: usize,

    /// Chrome executable; searched in common locations when unset.
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to existing browser instead of launching one.
    #[serde(default)]
    pub remote_url: Option<String>,
}

fn default_enabled() -> bool {
    true
}

pub fn default_headless() -> bool {
    true
}

pub fn default_timeout() -> u64 {
    20
}

fn default_script_timeout() -> u64 {
    10
}

fn default_settle_ms() -> u64 {
    800
}

fn default_click_top() -> usize {
    12
}

fn default_max_scrolls() -> usize {
    12
}

fn default_max_next_pages() -> usize {
    20
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            headless: default_headless(),
            timeout: default_timeout(),
            script_timeout: default_script_timeout(),
            settle_ms: default_settle_ms(),
            click_top: default_click_top(),
            max_scrolls: default_max_scrolls(),
            max_next_pages: default_max_next_pages(),
            chrome_path: None,
            chrome_args: Vec::new(),
            remote_url: None,
        }
    }
}
