//! Discovery-only command.

use std::path::Path;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;
use crate::models::CrawlTarget;
use crate::services::Orchestrator;

/// Discover one site and print resource tokens to stdout, one per line.
pub async fn cmd_discover(settings: Settings, target: CrawlTarget, out: &Path) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::new(settings, out)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    pb.set_message(format!("Discovering {}...", target.name));
    pb.enable_steady_tick(std::time::Duration::from_millis(120));

    let resources = orchestrator.discover(&target).await;
    pb.finish_and_clear();

    for resource in &resources {
        println!("{}", resource);
    }
    eprintln!(
        "{} Discovered {} resources from {} ({} deferred)",
        style("✓").green(),
        resources.len(),
        target.name,
        resources.iter().filter(|r| r.is_deferred()).count()
    );
    Ok(())
}
