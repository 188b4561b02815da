//! Data models for ataquire.

mod download;
mod resource;
mod target;

pub use download::{DownloadResult, SiteReport};
pub use resource::{DiscoveredResource, ParseResourceError, DETAIL_SCHEME};
pub use target::{slugify, CrawlTarget};
