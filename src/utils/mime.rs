//! MIME type and file extension classification.

/// Extensions treated as document-shaped URLs during discovery.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "xls", "xlsx", "odt", "htm", "html"];

/// Extensions accepted as already-complete filenames at persistence time.
const SAVED_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "xls", "xlsx", "odt", "htm", "html"];

/// Extract the lowercased file extension from a URL path (stripping query/fragment).
pub fn url_path_extension(url: &str) -> String {
    let path = url.split('?').next().unwrap_or(url);
    let path = path.split('#').next().unwrap_or(path);
    let last = path.rsplit('/').next().unwrap_or(path);
    match last.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => String::new(),
    }
}

/// Check if a URL path ends with a known document extension.
pub fn has_document_extension(url: &str) -> bool {
    let ext = url_path_extension(url);
    DOCUMENT_EXTENSIONS.contains(&ext.as_str())
}

/// Check if a filename already carries an extension we save under.
pub fn has_saved_extension(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((_, ext)) => SAVED_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
        None => false,
    }
}

/// Check if a declared Content-Type is a binary document we persist.
///
/// HTML is never binary, even when mislabelled as a download.
pub fn is_binary_document_type(content_type: &str) -> bool {
    let ct = content_type.to_lowercase();
    if ct.contains("html") {
        return false;
    }
    [
        "pdf",
        "msword",
        "word",
        "officedocument",
        "octet-stream",
        "binary",
        "ms-excel",
        "opendocument",
        "force-download",
    ]
    .iter()
    .any(|k| ct.contains(k))
}

/// Check if a declared Content-Type is HTML.
pub fn is_html_type(content_type: &str) -> bool {
    let ct = content_type.to_lowercase();
    ct.contains("text/html") || ct.contains("xhtml")
}

/// Extension implied by a Content-Type, if any.
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let ct = content_type.to_lowercase();
    if ct.contains("pdf") {
        Some("pdf")
    } else if ct.contains("spreadsheetml") {
        Some("xlsx")
    } else if ct.contains("ms-excel") {
        Some("xls")
    } else if ct.contains("wordprocessingml") || ct.contains("officedocument") {
        Some("docx")
    } else if ct.contains("msword") || ct.contains("word") {
        Some("doc")
    } else if ct.contains("opendocument.text") {
        Some("odt")
    } else if ct.contains("html") {
        Some("html")
    } else {
        None
    }
}

/// Generic filename for a response with no usable name.
pub fn generic_filename(content_type: &str) -> &'static str {
    let ct = content_type.to_lowercase();
    if ct.contains("pdf") {
        "documento.pdf"
    } else if ct.contains("word") || ct.contains("officedocument") {
        "documento.docx"
    } else if ct.contains("html") {
        "pagina.html"
    } else {
        "arquivo.bin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_extension_ignores_query() {
        assert!(has_document_extension("https://x.example/a/ata-03-2024.PDF?v=2"));
        assert!(!has_document_extension("https://x.example/downloads.php?cat=7"));
        assert!(!has_document_extension("https://x.example/pdf/"));
    }

    #[test]
    fn test_binary_document_type() {
        assert!(is_binary_document_type("application/pdf"));
        assert!(is_binary_document_type("application/octet-stream"));
        assert!(is_binary_document_type(
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        ));
        assert!(!is_binary_document_type("text/html; charset=utf-8"));
        assert!(!is_binary_document_type("application/json"));
    }

    #[test]
    fn test_extension_for_content_type() {
        assert_eq!(extension_for_content_type("application/pdf"), Some("pdf"));
        assert_eq!(extension_for_content_type("application/msword"), Some("doc"));
        assert_eq!(
            extension_for_content_type(
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            ),
            Some("xlsx")
        );
        assert_eq!(extension_for_content_type("application/octet-stream"), None);
    }

    #[test]
    fn test_generic_filename() {
        assert_eq!(generic_filename("application/pdf"), "documento.pdf");
        assert_eq!(generic_filename("text/html"), "pagina.html");
        assert_eq!(generic_filename(""), "arquivo.bin");
    }
}
