//! Relevance scoring for links and clickable elements.
//!
//! Scoring is a pure function over a [`ScoringTable`]: keyword rules with
//! weights plus a year bonus and a hub bonus. The table is plain data so it
//! can be tuned from the settings file without touching the crawl code.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::vocabulary::Vocabulary;
use crate::utils::text::fold_accents;

static YEAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap());

/// Which part of a candidate a rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreTarget {
    Text,
    Url,
    Both,
}

/// One weighted keyword rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRule {
    pub target: ScoreTarget,
    pub keywords: Vec<String>,
    pub weight: i32,
    /// Apply the weight once per matching keyword instead of once per rule.
    #[serde(default)]
    pub per_match: bool,
}

impl ScoreRule {
    fn apply(&self, text: &str, url: &str, both: &str) -> i32 {
        let haystack = match self.target {
            ScoreTarget::Text => text,
            ScoreTarget::Url => url,
            ScoreTarget::Both => both,
        };
        let hits = self
            .keywords
            .iter()
            .filter(|k| !k.is_empty() && haystack.contains(k.as_str()))
            .count() as i32;
        if self.per_match {
            hits * self.weight
        } else if hits > 0 {
            self.weight
        } else {
            0
        }
    }
}

/// Declarative scoring table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringTable {
    pub rules: Vec<ScoreRule>,
    /// Added when a 19xx/20xx year appears in text or URL.
    pub year_bonus: i32,
    /// Added to internal links that look like download hubs.
    pub hub_bonus: i32,
}

impl Default for ScoringTable {
    fn default() -> Self {
        Self::for_vocabulary(&Vocabulary::default())
    }
}

impl ScoringTable {
    /// Build the default rule set on top of a vocabulary.
    pub fn for_vocabulary(vocab: &Vocabulary) -> Self {
        let lower = |items: &[String]| -> Vec<String> {
            items.iter().map(|s| fold_accents(s).to_lowercase()).collect()
        };
        Self {
            rules: vec![
                ScoreRule {
                    target: ScoreTarget::Both,
                    keywords: lower(&vocab.topical_keywords),
                    weight: 8,
                    per_match: true,
                },
                ScoreRule {
                    target: ScoreTarget::Url,
                    keywords: ["ata", "atas", "download", "downloads", "arquivo", "document", "docs"]
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                    weight: 6,
                    per_match: false,
                },
                ScoreRule {
                    target: ScoreTarget::Both,
                    keywords: ["portal da transparencia", "transparencia", "ouvidoria", "noticia"]
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                    weight: -12,
                    per_match: false,
                },
                ScoreRule {
                    target: ScoreTarget::Url,
                    keywords: lower(&vocab.url_blacklist),
                    weight: -20,
                    per_match: false,
                },
            ],
            year_bonus: 6,
            hub_bonus: 30,
        }
    }

    /// Score a candidate from its visible text and URL.
    pub fn score(&self, text: &str, url: &str) -> i32 {
        let text = fold_accents(text).to_lowercase();
        let url = fold_accents(url).to_lowercase();
        let both = format!("{} {}", text, url);

        let mut total: i32 = self.rules.iter().map(|r| r.apply(&text, &url, &both)).sum();
        if YEAR_PATTERN.is_match(&both) {
            total += self.year_bonus;
        }
        total
    }
}

/// A link ranked for the crawl frontier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredLink {
    pub url: String,
    pub text: String,
    pub score: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topical_keywords_accumulate() {
        let table = ScoringTable::default();
        // "atas" matches both "ata" and "atas"; the URL adds the doc-token bonus
        let score = table.score("Atas", "https://x.example/atas");
        assert_eq!(score, 8 * 2 + 6);
    }

    #[test]
    fn test_year_bonus() {
        let table = ScoringTable::default();
        let without = table.score("Sobre", "https://x.example/sobre");
        let with = table.score("Sobre 2023", "https://x.example/sobre");
        assert_eq!(with - without, 6);
        // four digits inside a longer number are not a year
        assert_eq!(table.score("Sobre 120234", "https://x.example/sobre"), without);
    }

    #[test]
    fn test_navigation_and_blacklist_penalties() {
        let table = ScoringTable::default();
        let score = table.score("Portal da Transparência", "https://x.example/transparencia");
        assert!(score < 0, "navigation links should score negative, got {}", score);
    }

    #[test]
    fn test_plain_link_scores_zero() {
        let table = ScoringTable::default();
        assert_eq!(table.score("Quem somos", "https://x.example/institucional"), 0);
    }

    #[test]
    fn test_rule_without_per_match_counts_once() {
        let rule = ScoreRule {
            target: ScoreTarget::Text,
            keywords: vec!["a".into(), "b".into()],
            weight: 5,
            per_match: false,
        };
        assert_eq!(rule.apply("a b", "", "a b "), 5);
    }
}
