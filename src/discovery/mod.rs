//! Discovery: turning a site's root URL into a list of resource references.
//!
//! Strategies run in order (see [`SiteDiscovery::standard`]); the crawl
//! strategy drives a bounded BFS over static fetches, falling back to a
//! render session on promising pages that yield nothing statically.

pub mod control;
pub mod crawl;
pub mod extract;
pub mod frontier;
pub mod repository;
pub mod scoring;
pub mod sitemap;
pub mod strategy;
pub mod vocabulary;

pub use control::{
    forward_commands, ControlCommand, ControlHandle, ControlRegistry, CrawlControl, StallWatchdog,
};
pub use crawl::{crawl_site, BfsCrawl, CrawlOutcome};
pub use extract::{detail_record_id, extract, internal_links, is_hub, is_vendor_plugin_url};
pub use frontier::{Frontier, FrontierEntry};
pub use repository::RepositoryApiProbe;
pub use scoring::{ScoreRule, ScoreTarget, ScoredLink, ScoringTable};
pub use sitemap::SitemapFallback;
pub use strategy::{DiscoveryContext, DiscoveryOutcome, DiscoveryStrategy, SiteDiscovery};
pub use vocabulary::Vocabulary;
