//! ataquire - meeting-minute discovery and acquisition.
//!
//! Crawls heterogeneous public websites for meeting-minute records ("atas"),
//! resolves indirect and script-gated references into concrete files, and
//! persists them deduplicated by content hash.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod models;
pub mod scrapers;
pub mod services;
pub mod storage;
pub mod utils;
