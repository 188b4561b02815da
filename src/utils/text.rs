//! Keyword matching helpers.

/// Replace Latin accented letters with their ASCII base letter.
pub fn fold_accents(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'ç' => 'c',
            'Ç' => 'C',
            'ñ' => 'n',
            'Ñ' => 'N',
            other => other,
        })
        .collect()
}

/// Normalize text for keyword matching.
///
/// Folds accents, lowercases, turns `-` and `_` into spaces and collapses whitespace.
pub fn normalize_for_match(s: &str) -> String {
    let folded = fold_accents(s).to_lowercase().replace(['-', '_'], " ");
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether any of `needles` occurs in `haystack` (both assumed already normalized).
pub fn contains_any<S: AsRef<str>>(haystack: &str, needles: &[S]) -> bool {
    needles.iter().any(|n| {
        let n = n.as_ref();
        !n.is_empty() && haystack.contains(n)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_for_match() {
        assert_eq!(normalize_for_match("Balanço-2023.PDF"), "balanco 2023.pdf");
        assert_eq!(normalize_for_match("  Ata   da  Reunião "), "ata da reuniao");
        assert_eq!(normalize_for_match("comitê_de_investimentos"), "comite de investimentos");
    }

    #[test]
    fn test_contains_any_skips_empty_needles() {
        assert!(!contains_any("anything", &[""]));
        assert!(contains_any("relatorio anual", &["xyz", "relat"]));
    }
}
