//! Resolution of previously discovered tokens.

use std::io::Read;
use std::path::Path;

use anyhow::Context;
use console::style;
use tracing::warn;

use crate::cli::sink::JsonlSink;
use crate::config::Settings;
use crate::models::{CrawlTarget, DiscoveredResource};
use crate::services::Orchestrator;

/// Parse tokens, skipping blank lines, `#` comments and malformed entries.
fn parse_tokens(text: &str) -> Vec<DiscoveredResource> {
    let mut resources = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.parse::<DiscoveredResource>() {
            Ok(resource) if !resources.contains(&resource) => resources.push(resource),
            Ok(_) => {}
            Err(e) => warn!("Ignoring token {:?}: {}", line, e),
        }
    }
    resources
}

/// Resolve tokens for one site into its output directory.
pub async fn cmd_resolve(
    settings: Settings,
    target: CrawlTarget,
    out: &Path,
    input: Option<&Path>,
) -> anyhow::Result<()> {
    let text = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading tokens from {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading tokens from stdin")?;
            buf
        }
    };
    let resources = parse_tokens(&text);
    if resources.is_empty() {
        println!("{} No tokens to resolve", style("!").yellow());
        return Ok(());
    }

    println!(
        "{} Resolving {} resources for {}",
        style("→").cyan(),
        resources.len(),
        target.name
    );
    let orchestrator = Orchestrator::new(settings, out)?;
    let downloads = orchestrator.resolve(&target, resources).await?;

    JsonlSink::in_dir(&target.output_dir(out)).append(&downloads)?;
    JsonlSink::in_dir(out).append(&downloads)?;
    println!(
        "{} Saved {} new files to {}",
        style("✓").green(),
        downloads.len(),
        target.output_dir(out).display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tokens() {
        let text = "\n# comment\nhttps://a.example/ata.pdf\ndetail://https://a.example/pagina?id=7|7\nhttps://a.example/ata.pdf\ndetail://broken\n";
        let resources = parse_tokens(text);
        assert_eq!(
            resources,
            vec![
                DiscoveredResource::direct("https://a.example/ata.pdf"),
                DiscoveredResource::deferred("https://a.example/pagina?id=7", "7"),
            ]
        );
    }
}
