//! Service layer: resolution engine and site orchestration.
//!
//! Services hold the domain logic; the CLI only wires inputs and sinks.

pub mod download;
pub mod orchestrator;

pub use download::{Resolver, SiteStore};
pub use orchestrator::Orchestrator;
