//! HTTP client with retry, identity rotation and per-host throttling.

mod response;
mod user_agent;

pub use response::{parse_content_disposition_filename, HttpResponse};
pub use user_agent::{UserAgentPool, IMPERSONATE_USER_AGENTS};

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use reqwest::{Client, RequestBuilder};
use thiserror::Error;
use tracing::{debug, trace};

use super::throttle::DomainThrottle;
use crate::config::HttpConfig;

/// Errors from the static fetcher.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timed out after {timeout:?}: {url}")]
    Timeout { url: String, timeout: Duration },
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("gave up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: String,
    },
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

impl FetchError {
    /// Whether another attempt could succeed.
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Transport { .. } => true,
            FetchError::Status { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            FetchError::Exhausted { .. } | FetchError::Build(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Method {
    Get,
    PostForm,
}

/// HTTP client shared by discovery and resolution.
///
/// Cloning is cheap; clones share the connection pool, cookie store and throttle.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    throttle: DomainThrottle,
    agents: UserAgentPool,
    accept_language: String,
    retries: u32,
    backoff: (u64, u64),
    timeout: Duration,
}

impl HttpClient {
    /// Create a client with its own throttle.
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        Self::with_throttle(config, DomainThrottle::new(config.per_host_limit))
    }

    /// Create a client sharing an existing throttle.
    pub fn with_throttle(config: &HttpConfig, throttle: DomainThrottle) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(FetchError::Build)?;

        Ok(Self {
            client,
            throttle,
            agents: UserAgentPool::new(&config.user_agents),
            accept_language: config.accept_language.clone(),
            retries: config.retries.max(1),
            backoff: (config.backoff_min_ms, config.backoff_max_ms.max(config.backoff_min_ms)),
            timeout: config.timeout(),
        })
    }

    /// GET with retry. Non-success statuses are errors.
    pub async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        self.send_with_retry(Method::Get, url, &[], None).await
    }

    /// GET with a Referer header.
    pub async fn get_with_referer(&self, url: &str, referer: &str) -> Result<HttpResponse, FetchError> {
        self.send_with_retry(Method::Get, url, &[], Some(referer)).await
    }

    /// POST a urlencoded form with retry.
    pub async fn post_form(
        &self,
        url: &str,
        form: &[(String, String)],
        referer: Option<&str>,
    ) -> Result<HttpResponse, FetchError> {
        self.send_with_retry(Method::PostForm, url, form, referer).await
    }

    /// Get page content as text.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        Ok(self.get(url).await?.text())
    }

    /// Fetch a page for discovery. Failure is an empty page, never an error.
    pub async fn fetch_page(&self, url: &str) -> Option<String> {
        match self.get_text(url).await {
            Ok(html) if !html.trim().is_empty() => Some(html),
            Ok(_) => None,
            Err(e) => {
                debug!("Fetch failed for {}: {}", url, e);
                None
            }
        }
    }

    fn build(
        &self,
        method: Method,
        url: &str,
        form: &[(String, String)],
        referer: Option<&str>,
    ) -> RequestBuilder {
        let request = match method {
            Method::Get => self.client.get(url),
            Method::PostForm => self.client.post(url).form(form),
        };
        let request = request
            .header(reqwest::header::USER_AGENT, self.agents.pick())
            .header(reqwest::header::ACCEPT, "*/*")
            .header(reqwest::header::ACCEPT_LANGUAGE, &self.accept_language);
        match referer {
            Some(r) => request.header(reqwest::header::REFERER, r),
            None => request,
        }
    }

    /// One attempt: take a host slot, send, read the whole body, release.
    async fn attempt(
        &self,
        method: Method,
        url: &str,
        form: &[(String, String)],
        referer: Option<&str>,
    ) -> Result<HttpResponse, FetchError> {
        let _permit = self.throttle.acquire(url).await;
        let request = self.build(method, url, form, referer);

        let exchange = async {
            let response = request.send().await.map_err(|e| self.classify(url, e))?;
            let status = response.status();
            let final_url = response.url().to_string();
            let mut headers = HashMap::new();
            for (name, value) in response.headers() {
                if let Ok(v) = value.to_str() {
                    headers.insert(name.as_str().to_lowercase(), v.to_string());
                }
            }
            let body = response.bytes().await.map_err(|e| self.classify(url, e))?;
            Ok::<_, FetchError>(HttpResponse {
                status,
                final_url,
                headers,
                body: body.to_vec(),
            })
        };

        let response = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            })??;

        if response.status.is_success() {
            Ok(response)
        } else {
            Err(FetchError::Status {
                url: url.to_string(),
                status: response.status.as_u16(),
            })
        }
    }

    fn classify(&self, url: &str, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                source: error,
            }
        }
    }

    async fn send_with_retry(
        &self,
        method: Method,
        url: &str,
        form: &[(String, String)],
        referer: Option<&str>,
    ) -> Result<HttpResponse, FetchError> {
        let mut last = String::new();
        for attempt in 1..=self.retries {
            match self.attempt(method, url, form, referer).await {
                Ok(response) => return Ok(response),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    trace!("{:?} {} attempt {}/{} failed: {}", method, url, attempt, self.retries, e);
                    last = e.to_string();
                }
            }
            if attempt < self.retries {
                tokio::time::sleep(self.backoff_delay()).await;
            }
        }
        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts: self.retries,
            last,
        })
    }

    fn backoff_delay(&self) -> Duration {
        let (min, max) = self.backoff;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}
