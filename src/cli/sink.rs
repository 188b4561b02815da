//! JSONL output of download results.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::error;

use crate::models::{DownloadResult, SiteReport};

/// File name of the result log, at the output root and in each site directory.
pub const DOWNLOADS_FILE_NAME: &str = "downloads.jsonl";

/// Appends one JSON object per line.
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The sink for a directory's `downloads.jsonl`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(DOWNLOADS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, results: &[DownloadResult]) -> anyhow::Result<()> {
        if results.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        for result in results {
            let line = serde_json::to_string(result)?;
            writeln!(file, "{}", line).with_context(|| format!("writing {}", self.path.display()))?;
        }
        Ok(())
    }
}

/// Append a finished site's downloads to its own log and to the run log.
///
/// Write failures are logged and recorded on the report; they never stop
/// the caller from collecting the remaining sites.
pub fn record_report(report: &mut SiteReport, out: &Path, run_sink: &JsonlSink) {
    let site_sink = JsonlSink::in_dir(&report.target.output_dir(out));
    for sink in [&site_sink, run_sink] {
        if let Err(e) = sink.append(&report.downloads) {
            error!("{}: failed to write {}: {:#}", report.target.name, sink.path().display(), e);
            report.errors.push(format!("{:#}", e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CrawlTarget;
    use tempfile::tempdir;

    fn result(dir: &Path) -> DownloadResult {
        DownloadResult {
            local_path: dir.join("sc/inst/ata.pdf"),
            source_url: "https://a.example/ata.pdf".to_string(),
            site_name: "Inst".to_string(),
            region: "SC".to_string(),
            content_hash: "ab".repeat(32),
        }
    }

    #[test]
    fn test_append_one_object_per_line() {
        let dir = tempdir().unwrap();
        let sink = JsonlSink::in_dir(&dir.path().join("sc/inst"));
        let result = result(dir.path());
        sink.append(&[result.clone()]).unwrap();
        sink.append(&[result]).unwrap();

        let text = fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: DownloadResult = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.site_name, "Inst");
    }

    #[test]
    fn test_unwritable_site_log_is_recorded_and_run_log_still_written() {
        let out = tempdir().unwrap();
        // a plain file where the region directory should be
        fs::write(out.path().join("sc"), b"").unwrap();

        let mut report = SiteReport::empty(CrawlTarget::new("Inst", "SC", "https://a.example/"));
        report.downloads.push(result(out.path()));
        let run_sink = JsonlSink::in_dir(out.path());
        record_report(&mut report, out.path(), &run_sink);

        assert_eq!(report.errors.len(), 1);
        assert!(!report.is_success());
        let text = fs::read_to_string(run_sink.path()).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
