//! Dynamic render fallback.
//!
//! Discovery talks to a browser only through [`RenderSession`]. The Chrome
//! backend lives behind the `browser` feature; tests substitute fixture
//! sessions through [`RenderLauncher`].

mod config;
#[cfg(feature = "browser")]
mod chrome;
#[cfg(feature = "browser")]
mod scripts;

pub use config::BrowserEngineConfig;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Errors from a render session.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("browser unavailable: {0}")]
    Unavailable(String),
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("script timed out after {0:?}")]
    ScriptTimeout(Duration),
    #[error("script failed: {0}")]
    Script(String),
    #[error("browser crashed: {0}")]
    Crashed(String),
}

impl RenderError {
    /// Whether the session must be torn down.
    ///
    /// A failed script (stale element, navigation mid-script) leaves the
    /// session usable; everything else ends it.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RenderError::Script(_))
    }
}

/// Turn a non-fatal failure into `T::default()`; fatal errors pass through.
pub(crate) fn recover_non_fatal<T: Default>(
    result: Result<T, RenderError>,
    what: &str,
) -> Result<T, RenderError> {
    match result {
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            tracing::debug!("{} failed: {}", what, e);
            Ok(T::default())
        }
        ok => ok,
    }
}

/// A clickable element reported by the page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Clickable {
    /// Position among the page's `a`/`button` elements when listed.
    pub index: usize,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub href: String,
}

/// Ranks a clickable element; `None` excludes it.
pub type ClickRanker<'a> = dyn Fn(&Clickable) -> Option<i32> + Send + Sync + 'a;

/// One browser session, reused across all pages of a site crawl.
#[async_trait]
pub trait RenderSession: Send {
    /// Navigate to `url` and return the rendered HTML.
    async fn render(&mut self, url: &str) -> Result<String, RenderError>;

    /// Expand the current page: click tabs and vocabulary-matching
    /// elements, select year options, scroll until stable, follow
    /// "next page" controls. Returns the resulting HTML, including
    /// snapshots taken between interactions.
    async fn expand(&mut self) -> Result<String, RenderError>;

    /// List clickable `a`/`button` elements on the current page.
    async fn clickables(&mut self) -> Result<Vec<Clickable>, RenderError>;

    /// Click the element listed at `index` and return the HTML afterwards.
    async fn click(&mut self, index: usize) -> Result<String, RenderError>;

    /// Tear the session down.
    async fn close(&mut self);

    /// Click the `n` best-ranked elements one at a time, returning the HTML after each click.
    ///
    /// Elements ranked `None` or non-positive are never clicked. Ties keep page order.
    async fn click_top_candidates(
        &mut self,
        n: usize,
        rank: &ClickRanker<'_>,
    ) -> Result<Vec<String>, RenderError> {
        let mut scored: Vec<(i32, usize)> = self
            .clickables()
            .await?
            .iter()
            .filter_map(|c| rank(c).map(|score| (score, c.index)))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let mut pages = Vec::new();
        for (_, index) in scored.into_iter().take(n) {
            match self.click(index).await {
                Ok(html) => pages.push(html),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::debug!("Click on element {} failed: {}", index, e),
            }
        }
        Ok(pages)
    }
}

/// Creates render sessions on demand.
#[async_trait]
pub trait RenderLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn RenderSession>, RenderError>;
}

/// Launches Chrome sessions through the DevTools protocol.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    config: BrowserEngineConfig,
    /// Element text worth a programmatic click while expanding a page.
    tab_keywords: Vec<String>,
}

impl ChromeLauncher {
    pub fn new(config: BrowserEngineConfig, tab_keywords: Vec<String>) -> Self {
        Self {
            config,
            tab_keywords,
        }
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl RenderLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn RenderSession>, RenderError> {
        let session =
            chrome::ChromeRenderSession::start(self.config.clone(), self.tab_keywords.clone()).await?;
        Ok(Box::new(session))
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl RenderLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn RenderSession>, RenderError> {
        let _ = (&self.config, &self.tab_keywords);
        Err(RenderError::Unavailable(
            "built without the `browser` feature".to_string(),
        ))
    }
}
