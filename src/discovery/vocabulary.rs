//! Keyword vocabularies driving discovery heuristics.
//!
//! The defaults target Portuguese-language meeting minutes published by
//! municipal pension institutes. Every list can be overridden from the
//! `[vocabulary]` section of the settings file.

use serde::{Deserialize, Serialize};

use crate::utils::text::{contains_any, fold_accents, normalize_for_match};

/// Keyword lists used by extraction, scoring and the crawl loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    /// Words signalling the target document class in link text or URLs.
    pub topical_keywords: Vec<String>,
    /// URL fragments that make a page worth a dynamic render when static extraction is empty.
    pub promising_url_keywords: Vec<String>,
    /// URL fragments for pages unrelated to the document class (never crawled).
    pub url_blacklist: Vec<String>,
    /// Filename/anchor-text fragments that disqualify a document candidate.
    pub reject_keywords: Vec<String>,
    /// Element text never clicked during a render session.
    pub nav_reject: Vec<String>,
    /// Path tokens identifying a download hub.
    pub hub_path_tokens: Vec<String>,
    /// Query keys identifying a category listing on a hub.
    pub hub_query_keys: Vec<String>,
    /// Query key carrying a numeric record identifier on detail pages.
    pub record_id_key: String,
    /// Query keys marking a category listing (excludes detail detection).
    pub category_keys: Vec<String>,
    /// Query parameter used by the download-manager plugin.
    pub vendor_plugin_param: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            topical_keywords: strings(&[
                "ata", "atas", "reuni", "reuniao", "comit", "comite", "invest", "investimento",
                "investimentos", "conselho", "consel", "deliberativo", "fiscal",
            ]),
            promising_url_keywords: strings(&["ata", "reuni", "comit", "invest"]),
            url_blacklist: strings(&[
                "diariomunicipal",
                "diario-oficial",
                "diariooficial",
                "licitacao",
                "licitacoes",
                "pregao",
                "compras",
                "edital",
                "concurso",
                "legislacao",
                "/lei/",
                "/leis",
                "noticia",
                "noticias",
                "ouvidoria",
                "portal-da-transparencia",
                "portal_transparencia",
                "transparencia",
                "contato",
                "fale-conosco",
                "faleconosco",
                "login",
                "/auth",
                "/sso",
                "senha",
                "/rh/",
                "recursos-humanos",
            ]),
            reject_keywords: strings(&[
                "balanc", "demonstr", "extrato", "relatorio", "gestao", "contas", "financeiro",
                "orcament", "portaria", "resolucao", "resolucoes", "estatuto", "regimento",
                "normativo", "normativos", "membros", "composicao", "certificado", "certificacao",
                "credenciamento", "lei municipal", "lei complementar", "lei n", "decreto", "norma",
                "normas", "legislacao", "instrucao", "boletim", "informativo", "cartilha", "manual",
                "tutorial", "guia", "orientacao", "folder", "cronograma", "calendario",
                "recadastramento", "cadastro", "prova de vida", "planejamento", "politica",
                "informe", "censo", "organograma", "fluxograma", "formulario", "requerimento",
                "solicitacao", "declaracao", "termo", "convenio", "contrato", "licitacao", "edital",
                "concurso", "adesao", "noticia", "noticias", "evento", "publicacao", "revista",
                "gabarito", "resultado", "classificacao", "convocacao", "estudo", "atuarial",
                "governanca", "policy",
            ]),
            nav_reject: strings(&[
                "portal da transparencia",
                "transparencia",
                "ouvidoria",
                "noticia",
                "noticias",
                "legislacao",
                "leis",
                "estatuto",
                "regimento",
                "contato",
                "fale conosco",
                "home",
                "inicio",
                "institucional",
                "quem somos",
            ]),
            hub_path_tokens: strings(&[
                "download", "downloads", "arquivo", "arquivos", "document", "docs", "publica",
            ]),
            hub_query_keys: strings(&["cat", "categoria", "idcategoria", "tipo", "idcat"]),
            record_id_key: "id".to_string(),
            category_keys: strings(&["cat", "idcat"]),
            vendor_plugin_param: "wpdmdl".to_string(),
        }
    }
}

impl Vocabulary {
    /// Whether a URL belongs to a topic unrelated to the document class.
    pub fn is_blacklisted_url(&self, url: &str) -> bool {
        let lower = fold_accents(url).to_lowercase();
        contains_any(&lower, &self.url_blacklist)
    }

    /// Whether a URL is worth a dynamic render when static extraction found nothing.
    pub fn is_promising_url(&self, url: &str) -> bool {
        let lower = fold_accents(url).to_lowercase();
        contains_any(&lower, &self.promising_url_keywords)
    }

    /// Plausibility filter for document names and anchor text.
    ///
    /// False when any reject keyword occurs in the normalized text. Empty text is plausible.
    pub fn is_plausible(&self, text: &str) -> bool {
        let normalized = normalize_for_match(text);
        !self
            .reject_keywords
            .iter()
            .map(|k| normalize_for_match(k))
            .any(|k| !k.is_empty() && normalized.contains(&k))
    }

    /// Whether element text or href matches the navigation reject list.
    pub fn is_nav_rejected(&self, text: &str, href: &str) -> bool {
        let full = normalize_for_match(&format!("{} {}", text, href));
        self.nav_reject
            .iter()
            .map(|k| normalize_for_match(k))
            .any(|k| !k.is_empty() && full.contains(&k))
    }

    /// Whether element text mentions the target vocabulary.
    pub fn mentions_topic(&self, text: &str) -> bool {
        let lower = fold_accents(text).to_lowercase();
        contains_any(&lower, &self.topical_keywords)
    }
}
