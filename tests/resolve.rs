//! Resolution against mock sites, and full per-site pipelines.

mod common;

use std::sync::Arc;

use tempfile::tempdir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ataquire::config::Settings;
use ataquire::models::{CrawlTarget, DiscoveredResource, SiteReport};
use ataquire::scrapers::HttpClient;
use ataquire::services::download::{ResolveStats, Resolver, SiteStore};
use ataquire::services::Orchestrator;
use ataquire::storage::HashIndex;

use common::{fast_settings, mount_page, mount_pdf, pdf, saved_files};

fn resolver(settings: &Settings, target: &CrawlTarget, base: &std::path::Path) -> Resolver {
    let store = SiteStore::open(target.clone(), base).unwrap();
    Resolver::new(
        HttpClient::new(&settings.http).unwrap(),
        Arc::new(settings.vocabulary.clone()),
        Arc::new(store),
        settings.download.max_html_hops,
    )
}

fn counts(stats: &ResolveStats) -> (usize, usize, usize, usize) {
    stats.snapshot()
}

#[tokio::test]
async fn test_deferred_record_resolved_through_form_post() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/pagina",
        r#"<h1>Ata 77</h1>
           <form action="download.php" method="post">
             <input type="hidden" name="id" value="77">
             <button type="submit">Baixar</button>
           </form>"#,
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/download.php"))
        .and(body_string_contains("id=77"))
        .and(header("referer", format!("{}/pagina?id=77", server.uri()).as_str()))
        .respond_with(pdf(b"%PDF-1.4 ata setenta e sete"))
        .expect(1)
        .mount(&server)
        .await;

    let out = tempdir().unwrap();
    let settings = fast_settings();
    let target = CrawlTarget::new("Instituto", "SC", &server.uri());
    let resolver = resolver(&settings, &target, out.path());

    let token: DiscoveredResource = format!("detail://{}/pagina?id=77|77", server.uri())
        .parse()
        .unwrap();
    let saved = resolver.resolve(&token).await.expect("document saved");

    assert!(saved.local_path.exists());
    assert_eq!(saved.source_url, format!("{}/download.php", server.uri()));
    assert_eq!(saved.site_name, "Instituto");
    assert_eq!(resolver.store().indexed().await, 1);

    resolver.store().save_index().await.unwrap();
    let index = HashIndex::load(&target.output_dir(out.path())).unwrap();
    assert_eq!(index.len(), 1);
    assert!(index.contains(&saved.content_hash));
}

#[tokio::test]
async fn test_exhausted_deferred_record_is_abandoned() {
    let server = MockServer::start().await;
    mount_page(&server, "/docs/detalhe", "<p>Documento indisponível</p>").await;

    let out = tempdir().unwrap();
    let settings = fast_settings();
    let target = CrawlTarget::new("Instituto", "SC", &server.uri());
    let resolver = resolver(&settings, &target, out.path());

    let token = DiscoveredResource::deferred(format!("{}/docs/detalhe?id=9", server.uri()), "9");
    assert!(resolver.resolve(&token).await.is_none());
    assert_eq!(counts(resolver.stats()), (0, 0, 0, 1));
    assert!(saved_files(&target.output_dir(out.path())).is_empty());
}

#[tokio::test]
async fn test_direct_document_is_saved_once_across_runs() {
    let server = MockServer::start().await;
    mount_pdf(&server, "/atas/ata-01.pdf", b"%PDF-1.4 primeira ata").await;

    let out = tempdir().unwrap();
    let settings = fast_settings();
    let target = CrawlTarget::new("Instituto", "SC", &server.uri());
    let resource = DiscoveredResource::direct(format!("{}/atas/ata-01.pdf", server.uri()));

    let first = resolver(&settings, &target, out.path());
    assert!(first.resolve(&resource).await.is_some());
    first.store().save_index().await.unwrap();

    let second = resolver(&settings, &target, out.path());
    assert!(second.resolve(&resource).await.is_none());
    assert_eq!(counts(second.stats()), (0, 1, 0, 0));
    assert_eq!(saved_files(&target.output_dir(out.path())), vec!["ata-01.pdf"]);
}

#[tokio::test]
async fn test_html_answer_hops_to_linked_document() {
    let server = MockServer::start().await;
    mount_page(&server, "/ver/12", r#"<a href="/arquivos/ata-12.pdf">Ata 12</a>"#).await;
    mount_pdf(&server, "/arquivos/ata-12.pdf", b"%PDF-1.7 ata doze").await;

    let out = tempdir().unwrap();
    let settings = fast_settings();
    let target = CrawlTarget::new("Instituto", "SC", &server.uri());
    let resolver = resolver(&settings, &target, out.path());

    let saved = resolver
        .resolve(&DiscoveredResource::direct(format!("{}/ver/12", server.uri())))
        .await
        .expect("hop reached the document");
    assert_eq!(saved.source_url, format!("{}/arquivos/ata-12.pdf", server.uri()));
    assert!(saved.local_path.ends_with("ata-12.pdf"));
}

#[tokio::test]
async fn test_listing_navigation_is_skipped_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let out = tempdir().unwrap();
    let settings = fast_settings();
    let target = CrawlTarget::new("Instituto", "SC", &server.uri());
    let resolver = resolver(&settings, &target, out.path());

    let resource = DiscoveredResource::direct(format!("{}/atas.php?ano=2023", server.uri()));
    assert!(resolver.resolve(&resource).await.is_none());
    assert_eq!(counts(resolver.stats()), (0, 0, 1, 0));
}

#[tokio::test]
async fn test_html_disguised_as_pdf_is_not_saved() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ata-99.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_string("<html><body>Arquivo não encontrado</body></html>"),
        )
        .mount(&server)
        .await;

    let out = tempdir().unwrap();
    let settings = fast_settings();
    let target = CrawlTarget::new("Instituto", "SC", &server.uri());
    let resolver = resolver(&settings, &target, out.path());

    let resource = DiscoveredResource::direct(format!("{}/ata-99.pdf", server.uri()));
    assert!(resolver.resolve(&resource).await.is_none());
    assert_eq!(counts(resolver.stats()), (0, 0, 1, 0));
    assert!(saved_files(&target.output_dir(out.path())).is_empty());
}

async fn collect(orchestrator: &Orchestrator, targets: Vec<CrawlTarget>) -> Vec<SiteReport> {
    let mut rx = orchestrator.run(targets);
    let mut reports = Vec::new();
    while let Some(report) = rx.recv().await {
        reports.push(report);
    }
    reports.sort_by(|a, b| a.target.name.cmp(&b.target.name));
    reports
}

async fn mount_site(server: &MockServer, bytes: &[u8]) {
    mount_page(
        server,
        "/",
        r#"<a href="/ata-2024.pdf">Ata 2024</a>
           <a href="/copia/ata-2024.pdf">Ata 2024 (cópia)</a>"#,
    )
    .await;
    mount_pdf(server, "/ata-2024.pdf", bytes).await;
    mount_pdf(server, "/copia/ata-2024.pdf", bytes).await;
}

#[tokio::test]
async fn test_dedup_is_scoped_per_output_directory() {
    let bytes = b"%PDF-1.4 mesma ata publicada em dois sites";
    let a = MockServer::start().await;
    let b = MockServer::start().await;
    mount_site(&a, bytes).await;
    mount_site(&b, bytes).await;

    let out = tempdir().unwrap();
    let targets = vec![
        CrawlTarget::new("Instituto A", "SC", &format!("{}/", a.uri())),
        CrawlTarget::new("Instituto B", "SC", &format!("{}/", b.uri())),
    ];
    let orchestrator = Orchestrator::new(fast_settings(), out.path())
        .unwrap()
        .with_launcher(None);
    let reports = collect(&orchestrator, targets.clone()).await;

    assert_eq!(reports.len(), 2);
    for (report, target) in reports.iter().zip(&targets) {
        assert!(report.is_success(), "{:?}", report.errors);
        assert_eq!(report.discovered, 2);
        assert_eq!(report.downloads.len(), 1);
        assert_eq!(saved_files(&target.output_dir(out.path())).len(), 1);
    }
    assert_eq!(
        reports[0].downloads[0].content_hash,
        reports[1].downloads[0].content_hash
    );
}

#[tokio::test]
async fn test_second_run_saves_nothing_new() {
    let server = MockServer::start().await;
    mount_site(&server, b"%PDF-1.4 ata unica").await;

    let out = tempdir().unwrap();
    let target = CrawlTarget::new("Instituto", "PR", &format!("{}/", server.uri()));
    let orchestrator = Orchestrator::new(fast_settings(), out.path())
        .unwrap()
        .with_launcher(None);

    let first = collect(&orchestrator, vec![target.clone()]).await;
    assert_eq!(first[0].downloads.len(), 1);

    let second = collect(&orchestrator, vec![target.clone()]).await;
    assert!(second[0].downloads.is_empty());
    assert!(second[0].is_success());
    assert_eq!(saved_files(&target.output_dir(out.path())).len(), 1);
}
