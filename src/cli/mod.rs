//! Command-line interface.
//!
//! Parses arguments, loads settings and the site list, and dispatches to the
//! command modules.

mod commands;
mod sink;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::{load_sites, Settings};
use crate::models::CrawlTarget;

pub use sink::{record_report, JsonlSink};

#[derive(Parser)]
#[command(name = "ata")]
#[command(about = "Meeting-minute discovery and acquisition crawler")]
#[command(version)]
pub struct Cli {
    /// Settings file (TOML). Missing file means defaults.
    #[arg(short, long, global = true, env = "ATA_CONFIG")]
    config: Option<PathBuf>,

    /// Site list (TOML with [[site]] tables)
    #[arg(short, long, global = true, env = "ATA_SITES", default_value = "sites.toml")]
    sites: PathBuf,

    /// Output base directory
    #[arg(short, long, global = true, env = "ATA_OUT", default_value = "atas")]
    out: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Discover and download atas for every site (or the named ones)
    Run {
        /// Only run sites with these names
        #[arg(long = "site")]
        only: Vec<String>,
        /// Read stdin; an empty line skips the URL each active crawl is on
        #[arg(short, long)]
        interactive: bool,
        /// Disable the browser fallback
        #[arg(long)]
        no_browser: bool,
    },

    /// Discover resources for one site and print their tokens (does not download)
    Discover {
        /// Site name from the site list
        site: String,
    },

    /// Resolve tokens printed by `discover` into files
    Resolve {
        /// Site name from the site list
        site: String,
        /// Token file, one per line; stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            only,
            interactive,
            no_browser,
        } => {
            if no_browser {
                settings.browser.enabled = false;
            }
            let targets = select_targets(&cli.sites, &only)?;
            commands::cmd_run(settings, targets, &cli.out, interactive).await
        }
        Commands::Discover { site } => {
            let target = find_target(&cli.sites, &site)?;
            commands::cmd_discover(settings, target, &cli.out).await
        }
        Commands::Resolve { site, input } => {
            let target = find_target(&cli.sites, &site)?;
            commands::cmd_resolve(settings, target, &cli.out, input.as_deref()).await
        }
    }
}

fn select_targets(sites: &Path, only: &[String]) -> anyhow::Result<Vec<CrawlTarget>> {
    let targets = load_sites(sites)?;
    if only.is_empty() {
        return Ok(targets);
    }
    let selected: Vec<CrawlTarget> = targets
        .into_iter()
        .filter(|t| only.iter().any(|name| name == &t.name))
        .collect();
    if selected.is_empty() {
        anyhow::bail!("none of {:?} found in {}", only, sites.display());
    }
    Ok(selected)
}

fn find_target(sites: &Path, name: &str) -> anyhow::Result<CrawlTarget> {
    load_sites(sites)?
        .into_iter()
        .find(|t| t.name == name)
        .with_context(|| format!("site {:?} not found in {}", name, sites.display()))
}
