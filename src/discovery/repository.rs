//! Probe for a conventional folder/file listing API.
//!
//! Some institutes publish their documents through a small JSON API
//! (`api/folders`, `api/folders/{id}/files`). When it answers, its file list
//! is authoritative and no HTML crawl is needed.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::strategy::{DiscoveryContext, DiscoveryOutcome, DiscoveryStrategy};
use super::Vocabulary;
use crate::models::{CrawlTarget, DiscoveredResource};
use crate::utils::mime::has_document_extension;
use crate::utils::url::resolve_href;

const LIST_KEYS: &[&str] = &["data", "items", "folders", "files"];
const NAME_KEYS: &[&str] = &["name", "nome", "title", "filename"];
const URL_KEYS: &[&str] = &["url", "link", "href", "path"];

/// Items of a JSON listing: a bare array or one wrapped under a conventional key.
fn listing_items(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(map) => LIST_KEYS
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_array)),
        _ => None,
    }
}

fn string_field(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match item.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Folder ids from a folder listing.
pub fn folder_ids(body: &str) -> Vec<String> {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return Vec::new();
    };
    listing_items(&value)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| string_field(item, &["id"]))
                .collect()
        })
        .unwrap_or_default()
}

/// Plausible document files from a file listing.
pub fn listed_files(root: &str, body: &str, vocab: &Vocabulary) -> Vec<DiscoveredResource> {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return Vec::new();
    };
    let Some(items) = listing_items(&value) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let name = string_field(item, NAME_KEYS)?;
            let url = resolve_href(root, &string_field(item, URL_KEYS)?)?;
            if vocab.is_plausible(&name) && has_document_extension(&url) {
                Some(DiscoveredResource::direct(url))
            } else {
                None
            }
        })
        .collect()
}

fn api_url(root: &str, path: &str) -> String {
    format!("{}/{}", root.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Discovery strategy querying the listing API before any crawl.
pub struct RepositoryApiProbe;

#[async_trait]
impl DiscoveryStrategy for RepositoryApiProbe {
    fn name(&self) -> &str {
        "repository-api"
    }

    async fn discover(&self, target: &CrawlTarget, ctx: &DiscoveryContext) -> DiscoveryOutcome {
        let api = &ctx.repository_api;
        if !api.enabled {
            return DiscoveryOutcome::NoOpinion;
        }
        let root = &target.root_url;
        let Ok(folders) = ctx.http.get_text(&api_url(root, &api.folders_path)).await else {
            return DiscoveryOutcome::NoOpinion;
        };
        let ids = folder_ids(&folders);
        if ids.is_empty() {
            return DiscoveryOutcome::NoOpinion;
        }
        debug!("{}: listing API exposes {} folders", target.name, ids.len());

        let mut resources: Vec<DiscoveredResource> = Vec::new();
        for id in ids {
            let files_url = api_url(root, &api.files_path.replace("{id}", &id));
            match ctx.http.get_text(&files_url).await {
                Ok(body) => {
                    for resource in listed_files(root, &body, &ctx.vocabulary) {
                        if !resources.contains(&resource) {
                            resources.push(resource);
                        }
                    }
                }
                Err(e) => debug!("Folder listing {} failed: {}", files_url, e),
            }
        }
        DiscoveryOutcome::from_resources(resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_ids_from_wrapped_listing() {
        let body = r#"{"data": [{"id": 3, "nome": "Atas"}, {"id": "7"}, {"nome": "sem id"}]}"#;
        assert_eq!(folder_ids(body), vec!["3".to_string(), "7".to_string()]);
        assert!(folder_ids("<html></html>").is_empty());
    }

    #[test]
    fn test_listed_files_filters_names_and_extensions() {
        let vocab = Vocabulary::default();
        let body = r#"[
            {"nome": "Ata 05-2024", "url": "/storage/ata-05-2024.pdf"},
            {"nome": "Balancete março", "url": "/storage/balancete.pdf"},
            {"title": "Ata reunião", "link": "https://a.example/ver/12"}
        ]"#;
        let files = listed_files("https://a.example/", body, &vocab);
        assert_eq!(
            files,
            vec![DiscoveredResource::direct("https://a.example/storage/ata-05-2024.pdf")]
        );
    }

    #[test]
    fn test_api_url_joins_cleanly() {
        assert_eq!(api_url("https://a.example/", "/api/folders"), "https://a.example/api/folders");
        assert_eq!(api_url("https://a.example", "api/folders/3/files"), "https://a.example/api/folders/3/files");
    }
}
