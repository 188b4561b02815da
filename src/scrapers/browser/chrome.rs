//! Chrome DevTools backend for [`RenderSession`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::scripts;
use super::{recover_non_fatal, BrowserEngineConfig, Clickable, RenderError, RenderSession};

/// Common Chrome executable paths to check.
const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/google/chrome/google-chrome",
];

fn find_chrome(configured: Option<&Path>) -> Result<PathBuf, RenderError> {
    if let Some(path) = configured {
        return Ok(path.to_path_buf());
    }
    for path in CHROME_PATHS {
        let p = Path::new(path);
        if p.exists() {
            debug!("Found Chrome at: {}", path);
            return Ok(p.to_path_buf());
        }
    }
    for cmd in &["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    debug!("Found Chrome in PATH: {}", path);
                    return Ok(PathBuf::from(path));
                }
            }
        }
    }
    Err(RenderError::Unavailable(
        "Chrome/Chromium not found; install it or set browser.chrome_path".to_string(),
    ))
}

/// One Chrome tab driven for a whole site crawl.
pub struct ChromeRenderSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Page,
    config: BrowserEngineConfig,
    tab_keywords: Vec<String>,
    current_url: Option<String>,
}

impl ChromeRenderSession {
    /// Launch Chrome, or attach to `remote_url` when configured.
    pub async fn start(
        config: BrowserEngineConfig,
        tab_keywords: Vec<String>,
    ) -> Result<Self, RenderError> {
        let (browser, mut handler) = match config.remote_url.as_deref() {
            Some(remote) => connect_remote(remote, &config).await?,
            None => {
                info!("Launching browser (headless={})", config.headless);
                let mut builder =
                    BrowserConfig::builder().chrome_executable(find_chrome(config.chrome_path.as_deref())?);
                if !config.headless {
                    builder = builder.with_head();
                }
                builder = builder
                    .arg("--disable-blink-features=AutomationControlled")
                    .arg("--disable-dev-shm-usage")
                    .arg("--no-first-run")
                    .arg("--no-sandbox")
                    .arg("--disable-gpu")
                    .arg("--window-size=1300,900");
                for arg in &config.chrome_args {
                    builder = builder.arg(arg);
                }
                let browser_config = builder.build().map_err(RenderError::Launch)?;
                Browser::launch(browser_config)
                    .await
                    .map_err(|e| RenderError::Launch(e.to_string()))?
            }
        };

        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        Ok(Self {
            browser,
            handler,
            page,
            config,
            tab_keywords,
            current_url: None,
        })
    }

    fn settle(&self) -> Duration {
        Duration::from_millis(self.config.settle_ms)
    }

    /// Evaluate a script under the script timeout.
    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T, RenderError> {
        let limit = Duration::from_secs(self.config.script_timeout);
        let result = tokio::time::timeout(limit, self.page.evaluate(script))
            .await
            .map_err(|_| RenderError::ScriptTimeout(limit))?
            .map_err(|e| RenderError::Script(e.to_string()))?;
        result
            .into_value()
            .map_err(|e| RenderError::Script(e.to_string()))
    }

    async fn content(&self) -> Result<String, RenderError> {
        let limit = Duration::from_secs(self.config.script_timeout);
        tokio::time::timeout(limit, self.page.content())
            .await
            .map_err(|_| RenderError::ScriptTimeout(limit))?
            .map_err(|e| RenderError::Crashed(e.to_string()))
    }

    async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|reason| RenderError::Navigation {
                url: url.to_string(),
                reason,
            })?;
        let limit = Duration::from_secs(self.config.timeout);
        tokio::time::timeout(limit, self.page.execute(params))
            .await
            .map_err(|_| RenderError::Navigation {
                url: url.to_string(),
                reason: format!("page load exceeded {:?}", limit),
            })?
            .map_err(|e| RenderError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        self.current_url = Some(url.to_string());

        if let Err(e) = self.eval::<String>(scripts::WAIT_READY.to_string()).await {
            debug!("Could not check ready state for {}: {}", url, e);
        }
        tokio::time::sleep(self.settle()).await;
        Ok(())
    }

    async fn page_url(&self) -> Option<String> {
        self.page.url().await.ok().flatten()
    }
}

#[async_trait]
impl RenderSession for ChromeRenderSession {
    async fn render(&mut self, url: &str) -> Result<String, RenderError> {
        self.navigate(url).await?;
        if let Err(e) = self.eval::<bool>(scripts::LIGHT_SCROLL.to_string()).await {
            if e.is_fatal() {
                return Err(e);
            }
        }
        self.content().await
    }

    async fn expand(&mut self) -> Result<String, RenderError> {
        let mut snapshots = Vec::new();

        match self.eval::<u32>(scripts::click_tabs(&self.tab_keywords)).await {
            Ok(n) => debug!("Clicked {} tab-like elements", n),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => debug!("Tab expansion failed: {}", e),
        }
        tokio::time::sleep(self.settle()).await;
        snapshots.push(self.content().await?);

        let options: Vec<(usize, String)> = recover_non_fatal(
            self.eval(scripts::LIST_YEAR_OPTIONS.to_string()).await,
            "Listing year options",
        )?;
        for (select, value) in options {
            match self.eval::<bool>(scripts::select_option(select, &value)).await {
                Ok(true) => {
                    tokio::time::sleep(self.settle()).await;
                    snapshots.push(self.content().await?);
                }
                Ok(false) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => debug!("Selecting year {} failed: {}", value, e),
            }
        }

        if let Err(e) = self
            .eval::<u64>(scripts::scroll_to_bottom(self.config.max_scrolls))
            .await
        {
            if e.is_fatal() {
                return Err(e);
            }
        }
        let mut last = self.content().await?;
        snapshots.push(last.clone());

        for _ in 0..self.config.max_next_pages {
            match self.eval::<bool>(scripts::CLICK_NEXT.to_string()).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) if e.is_fatal() => return Err(e),
                Err(_) => break,
            }
            tokio::time::sleep(self.settle()).await;
            let html = self.content().await?;
            if html == last {
                break;
            }
            snapshots.push(html.clone());
            last = html;
        }

        Ok(snapshots.join("\n"))
    }

    async fn clickables(&mut self) -> Result<Vec<Clickable>, RenderError> {
        self.eval(scripts::TAG_CLICKABLES.to_string()).await
    }

    async fn click(&mut self, index: usize) -> Result<String, RenderError> {
        // A previous click may have navigated away; reload and retag.
        if let Some(url) = self.current_url.clone() {
            if self.page_url().await.as_deref() != Some(url.as_str()) {
                self.navigate(&url).await?;
                self.eval::<Vec<Clickable>>(scripts::TAG_CLICKABLES.to_string())
                    .await?;
            }
        }
        let clicked: bool = self.eval(scripts::click_tagged(index)).await?;
        if !clicked {
            return Err(RenderError::Script(format!("element {} is gone", index)));
        }
        tokio::time::sleep(self.settle()).await;
        self.content().await
    }

    async fn close(&mut self) {
        if let Err(e) = self.browser.close().await {
            debug!("Browser close failed: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }
}

/// Attach to a running Chrome through its DevTools endpoint.
async fn connect_remote(
    url: &str,
    config: &BrowserEngineConfig,
) -> Result<(Browser, chromiumoxide::handler::Handler), RenderError> {
    info!("Connecting to remote browser at {}", url);

    let http_url = url.replace("ws://", "http://").replace("wss://", "https://");
    let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

    let version: serde_json::Value = reqwest::Client::new()
        .get(&version_url)
        .timeout(Duration::from_secs(config.timeout))
        .send()
        .await
        .map_err(|e| RenderError::Launch(e.to_string()))?
        .json()
        .await
        .map_err(|e| RenderError::Launch(e.to_string()))?;

    let ws_url = version
        .get("webSocketDebuggerUrl")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RenderError::Launch("no webSocketDebuggerUrl in response".to_string()))?;

    let handler_config = chromiumoxide::handler::HandlerConfig {
        request_timeout: Duration::from_secs(config.timeout),
        ..Default::default()
    };
    Browser::connect_with_config(ws_url, handler_config)
        .await
        .map_err(|e| RenderError::Launch(e.to_string()))
}
