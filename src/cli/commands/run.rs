//! Full run: every site's discovery and resolution.

use std::io::BufRead;
use std::path::Path;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tracing::warn;

use crate::cli::sink::{record_report, JsonlSink};
use crate::config::Settings;
use crate::discovery::{forward_commands, ControlCommand};
use crate::models::CrawlTarget;
use crate::services::Orchestrator;

/// Run all targets, streaming results to the JSONL sinks as sites finish.
pub async fn cmd_run(
    settings: Settings,
    targets: Vec<CrawlTarget>,
    out: &Path,
    interactive: bool,
) -> anyhow::Result<()> {
    if targets.is_empty() {
        println!("{} No sites to run", style("!").yellow());
        return Ok(());
    }

    println!(
        "{} Running {} site{} ({} at a time) into {}",
        style("→").cyan(),
        targets.len(),
        if targets.len() == 1 { "" } else { "s" },
        settings.download.site_workers,
        out.display()
    );

    let orchestrator = Orchestrator::new(settings, out)?;

    let shutdown = orchestrator.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight sites");
            shutdown.cancel();
        }
    });

    if interactive {
        let (tx, rx) = mpsc::channel(8);
        spawn_stdin_reader(tx);
        tokio::spawn(forward_commands(rx, orchestrator.registry()));
        println!(
            "{} Press Enter to skip the URL each active crawl is on",
            style("→").dim()
        );
    }

    let pb = ProgressBar::new(targets.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} sites {msg}")?
            .progress_chars("=> "),
    );

    let run_sink = JsonlSink::in_dir(out);
    let mut reports = orchestrator.run(targets);
    let mut total_saved = 0usize;
    let mut failed_sites = 0usize;

    while let Some(mut report) = reports.recv().await {
        record_report(&mut report, out, &run_sink);
        total_saved += report.downloads.len();

        if report.is_success() {
            pb.println(format!(
                "  {} {} ({}): {} discovered, {} saved",
                style("✓").green(),
                report.target.name,
                report.target.region,
                report.discovered,
                report.downloads.len()
            ));
        } else {
            failed_sites += 1;
            pb.println(format!(
                "  {} {} ({}): {}",
                style("✗").red(),
                report.target.name,
                report.target.region,
                report.errors.join("; ")
            ));
        }
        pb.set_message(report.target.name.clone());
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!(
        "{} {} new file{} saved, {} site{} with errors",
        style("✓").green(),
        total_saved,
        if total_saved == 1 { "" } else { "s" },
        failed_sites,
        if failed_sites == 1 { "" } else { "s" }
    );
    Ok(())
}

/// Forward empty stdin lines as skip commands.
///
/// Runs on a plain thread so a pending read never holds up shutdown.
fn spawn_stdin_reader(tx: mpsc::Sender<ControlCommand>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if line.trim().is_empty() && tx.blocking_send(ControlCommand::SkipCurrent).is_err() {
                break;
            }
        }
    });
}
