//! Shared fixtures for the HTTP-level tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ataquire::config::Settings;
use ataquire::discovery::{CrawlControl, DiscoveryContext};
use ataquire::scrapers::{Clickable, HttpClient, RenderError, RenderLauncher, RenderSession};

/// Settings for mock servers: one attempt, no backoff.
pub fn fast_settings() -> Settings {
    let mut settings = Settings::default();
    settings.http.retries = 1;
    settings.http.backoff_min_ms = 0;
    settings.http.backoff_max_ms = 0;
    settings.http.timeout_secs = 5;
    settings.repository_api.enabled = false;
    settings
}

pub fn context(settings: &Settings, launcher: Option<Arc<dyn RenderLauncher>>) -> DiscoveryContext {
    let http = HttpClient::new(&settings.http).unwrap();
    DiscoveryContext::new(http, settings, launcher, CrawlControl::default())
}

pub fn html_page(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(format!("<html><body>{}</body></html>", body))
}

pub fn pdf(bytes: &[u8]) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/pdf")
        .set_body_bytes(bytes.to_vec())
}

pub async fn mount_page(server: &MockServer, at: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(html_page(body))
        .mount(server)
        .await;
}

pub async fn mount_pdf(server: &MockServer, at: &str, bytes: &[u8]) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(pdf(bytes))
        .mount(server)
        .await;
}

/// Files in a directory, excluding the hash index and result logs.
pub fn saved_files(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|n| !n.starts_with('.') && !n.ends_with(".jsonl"))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

/// Canned HTML for each step of a render session.
#[derive(Clone, Default)]
pub struct Fixture {
    pub rendered: String,
    pub expanded: String,
    pub clickables: Vec<Clickable>,
    /// HTML returned after clicking the element with the same position.
    pub clicked: Vec<String>,
    /// Make `render` fail with a fatal error.
    pub crash: bool,
    /// Make `render` panic, taking the site pipeline down with it.
    pub panic: bool,
}

/// Launcher handing out fixture sessions and counting launches and renders.
#[derive(Clone, Default)]
pub struct FixtureLauncher {
    pub fixture: Fixture,
    pub launches: Arc<AtomicUsize>,
    pub rendered_urls: Arc<Mutex<Vec<String>>>,
}

impl FixtureLauncher {
    pub fn new(fixture: Fixture) -> Self {
        Self {
            fixture,
            ..Self::default()
        }
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn rendered(&self) -> Vec<String> {
        self.rendered_urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RenderLauncher for FixtureLauncher {
    async fn launch(&self) -> Result<Box<dyn RenderSession>, RenderError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FixtureSession {
            fixture: self.fixture.clone(),
            rendered_urls: self.rendered_urls.clone(),
        }))
    }
}

struct FixtureSession {
    fixture: Fixture,
    rendered_urls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl RenderSession for FixtureSession {
    async fn render(&mut self, url: &str) -> Result<String, RenderError> {
        self.rendered_urls.lock().unwrap().push(url.to_string());
        if self.fixture.panic {
            panic!("renderer fault on {}", url);
        }
        if self.fixture.crash {
            return Err(RenderError::Crashed("fixture crash".into()));
        }
        Ok(self.fixture.rendered.clone())
    }

    async fn expand(&mut self) -> Result<String, RenderError> {
        Ok(self.fixture.expanded.clone())
    }

    async fn clickables(&mut self) -> Result<Vec<Clickable>, RenderError> {
        Ok(self.fixture.clickables.clone())
    }

    async fn click(&mut self, index: usize) -> Result<String, RenderError> {
        self.fixture
            .clicked
            .get(index)
            .cloned()
            .ok_or_else(|| RenderError::Script(format!("no element {}", index)))
    }

    async fn close(&mut self) {}
}
