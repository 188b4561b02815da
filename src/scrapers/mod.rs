//! Fetching layers: the static HTTP client, per-host throttling and the
//! dynamic render fallback.

pub mod browser;
pub mod http_client;
pub mod throttle;

pub use browser::{
    BrowserEngineConfig, ChromeLauncher, Clickable, RenderError, RenderLauncher, RenderSession,
};
pub use http_client::{FetchError, HttpClient, HttpResponse};
pub use throttle::{DomainThrottle, HostPermit};
