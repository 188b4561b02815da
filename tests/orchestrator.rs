//! Multi-site runs: fault isolation between pipelines and interrupted runs.

mod common;

use std::sync::Arc;

use tempfile::tempdir;
use wiremock::MockServer;

use ataquire::cli::{record_report, JsonlSink};
use ataquire::models::{CrawlTarget, DiscoveredResource, SiteReport};
use ataquire::scrapers::{HttpClient, RenderLauncher};
use ataquire::services::download::{Resolver, SiteStore};
use ataquire::services::Orchestrator;
use ataquire::storage::INDEX_FILE_NAME;

use common::{fast_settings, mount_page, mount_pdf, saved_files, Fixture, FixtureLauncher};

async fn collect(orchestrator: &Orchestrator, targets: Vec<CrawlTarget>) -> Vec<SiteReport> {
    let mut rx = orchestrator.run(targets);
    let mut reports = Vec::new();
    while let Some(report) = rx.recv().await {
        reports.push(report);
    }
    reports.sort_by(|a, b| a.target.name.cmp(&b.target.name));
    reports
}

#[tokio::test]
async fn test_failing_sites_do_not_affect_healthy_site() {
    let healthy = MockServer::start().await;
    mount_page(&healthy, "/", r#"<a href="/ata-2024.pdf">Ata 2024</a>"#).await;
    mount_pdf(&healthy, "/ata-2024.pdf", b"%PDF-1.4 ata do instituto saudavel").await;

    let crashing = MockServer::start().await;
    mount_page(&crashing, "/atas", "<p>carregando...</p>").await;

    let out = tempdir().unwrap();
    // a plain file where the "PR" region directory would go
    std::fs::write(out.path().join("pr"), b"").unwrap();

    let targets = vec![
        CrawlTarget::new("A Saudavel", "SC", &format!("{}/", healthy.uri())),
        CrawlTarget::new("B Quebrado", "PR", &format!("{}/", healthy.uri())),
        CrawlTarget::new("C Travado", "SC", &format!("{}/atas", crashing.uri())),
    ];
    let launcher: Arc<dyn RenderLauncher> = Arc::new(FixtureLauncher::new(Fixture {
        panic: true,
        ..Fixture::default()
    }));
    let orchestrator = Orchestrator::new(fast_settings(), out.path())
        .unwrap()
        .with_launcher(Some(launcher));

    let mut reports = collect(&orchestrator, targets.clone()).await;
    assert_eq!(reports.len(), 3);

    let run_sink = JsonlSink::in_dir(out.path());
    for report in reports.iter_mut() {
        record_report(report, out.path(), &run_sink);
    }

    let ok = &reports[0];
    assert!(ok.is_success(), "{:?}", ok.errors);
    assert_eq!(ok.downloads.len(), 1);
    let ok_dir = targets[0].output_dir(out.path());
    assert_eq!(saved_files(&ok_dir), vec!["ata-2024.pdf"]);
    assert!(ok_dir.join(INDEX_FILE_NAME).exists());
    assert!(ok_dir.join("downloads.jsonl").exists());

    assert!(!reports[1].is_success());
    assert!(reports[1].downloads.is_empty());

    assert!(!reports[2].is_success());
    assert!(
        reports[2].errors.iter().any(|e| e.contains("pipeline aborted")),
        "{:?}",
        reports[2].errors
    );

    let run_log = std::fs::read_to_string(run_sink.path()).unwrap();
    assert_eq!(run_log.lines().count(), 1);
}

#[tokio::test]
async fn test_interrupted_run_starts_no_sites() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/ata.pdf">Ata</a>"#).await;

    let out = tempdir().unwrap();
    let orchestrator = Orchestrator::new(fast_settings(), out.path())
        .unwrap()
        .with_launcher(None);
    orchestrator.shutdown_token().cancel();

    let targets = vec![
        CrawlTarget::new("Instituto A", "SC", &format!("{}/", server.uri())),
        CrawlTarget::new("Instituto B", "SC", &format!("{}/", server.uri())),
    ];
    let reports = collect(&orchestrator, targets).await;

    assert_eq!(reports.len(), 2);
    for report in &reports {
        assert!(report.errors.iter().any(|e| e.contains("interrupted")));
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancelled_resolver_starts_no_downloads() {
    let server = MockServer::start().await;
    mount_pdf(&server, "/ata.pdf", b"%PDF-1.4 ata").await;

    let out = tempdir().unwrap();
    let settings = fast_settings();
    let target = CrawlTarget::new("Instituto", "SC", &server.uri());
    let store = Arc::new(SiteStore::open(target, out.path()).unwrap());
    let cancel = tokio_util::sync::CancellationToken::new();
    let resolver = Resolver::new(
        HttpClient::new(&settings.http).unwrap(),
        Arc::new(settings.vocabulary.clone()),
        store,
        settings.download.max_html_hops,
    )
    .with_cancel(cancel.clone());
    cancel.cancel();

    let resources = vec![DiscoveredResource::direct(format!("{}/ata.pdf", server.uri()))];
    assert!(resolver.resolve_all(resources, 2).await.is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}
