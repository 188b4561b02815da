//! Crawl target models.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One independently operated site to crawl.
///
/// Targets are immutable input, supplied by the site list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlTarget {
    /// Human-readable name, also used to derive the output directory.
    pub name: String,
    /// Region code (state abbreviation for the default site list).
    pub region: String,
    /// Root URL the crawl is seeded with.
    #[serde(alias = "url")]
    pub root_url: String,
}

impl CrawlTarget {
    /// Create a new crawl target.
    pub fn new(name: &str, region: &str, root_url: &str) -> Self {
        Self {
            name: name.to_string(),
            region: region.to_string(),
            root_url: root_url.to_string(),
        }
    }

    /// Identity of the target within a run: `{region}/{slug(name)}`.
    ///
    /// Matches the output directory relative to the output root.
    pub fn key(&self) -> String {
        format!("{}/{}", slugify(&self.region), slugify(&self.name))
    }

    /// Output directory for this target under `base`.
    ///
    /// `{base}/{region}/{slug(name)}`
    pub fn output_dir(&self, base: &Path) -> PathBuf {
        base.join(slugify(&self.region)).join(slugify(&self.name))
    }
}

/// Lowercase ASCII slug with `_` separators.
pub fn slugify(s: &str) -> String {
    let folded = crate::utils::text::fold_accents(s).to_lowercase();
    let mut out = String::with_capacity(folded.len());
    let mut last_sep = true;
    for c in folded.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            last_sep = false;
        } else if !last_sep {
            out.push('_');
            last_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    if out.is_empty() {
        "site".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_folds_accents() {
        assert_eq!(slugify("INPREVID Videira"), "inprevid_videira");
        assert_eq!(slugify("Instituto de Previdência - São José"), "instituto_de_previdencia_sao_jose");
        assert_eq!(slugify("***"), "site");
    }

    #[test]
    fn test_output_dir() {
        let target = CrawlTarget::new("IPREV Joinville", "SC", "https://example.org/");
        assert_eq!(
            target.output_dir(Path::new("/data")),
            PathBuf::from("/data/sc/iprev_joinville")
        );
    }

    #[test]
    fn test_key_matches_output_dir() {
        let target = CrawlTarget::new("Fundo São José", "SC", "https://example.org/");
        assert_eq!(target.key(), "sc/fundo_sao_jose");
        assert_eq!(
            target.output_dir(Path::new("/data")),
            Path::new("/data").join(target.key())
        );
    }

    #[test]
    fn test_deserialize_url_alias() {
        let target: CrawlTarget =
            toml::from_str("name = \"X\"\nregion = \"PR\"\nurl = \"https://x.example/\"").unwrap();
        assert_eq!(target.root_url, "https://x.example/");
    }
}
