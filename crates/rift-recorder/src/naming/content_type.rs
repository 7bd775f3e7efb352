//! File extensions for extracted response bodies.

use super::url_path;

/// Extension used when nothing better is known about a body.
pub const DEFAULT_EXTENSION: &str = "txt";

const COMMON_MIME_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpeg"),
    ("image/gif", "gif"),
    ("image/tiff", "tiff"),
    ("image/png", "png"),
    ("image/x-icon", "ico"),
    ("image/svg+xml", "svg"),
    ("image/webp", "webp"),
    ("audio/x-aiff", "aiff"),
    ("video/x-ms-asf", "asf"),
    ("video/mpeg", "mp2"),
    ("audio/mpeg", "mp3"),
    ("video/quicktime", "mov"),
    ("application/pdf", "pdf"),
    ("application/zip", "zip"),
    ("application/gzip", "gz"),
    ("application/octet-stream", "bin"),
    ("text/css", "css"),
    ("text/csv", "csv"),
    ("text/html", "html"),
    ("application/javascript", "js"),
    ("text/javascript", "js"),
];

/// Mime part of a `Content-Type` header value, lowercased, parameters removed.
pub fn mime_type_part(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Pick a file extension for a body.
///
/// A declared content type wins, then an extension on the URL's last path
/// segment, then a sniff of the body itself, then [`DEFAULT_EXTENSION`].
pub fn determine_file_extension(url: &str, content_type: Option<&str>, body: &[u8]) -> String {
    if let Some(ext) = content_type.and_then(extension_for_content_type) {
        return ext;
    }
    if let Some(ext) = extension_from_url(url) {
        return ext;
    }
    determine_text_file_extension(body).to_string()
}

fn extension_for_content_type(content_type: &str) -> Option<String> {
    let mime = mime_type_part(content_type);
    if mime.is_empty() {
        return None;
    }
    // Specific table entries first so that e.g. image/svg+xml keeps `svg`.
    if let Some((_, ext)) = COMMON_MIME_TYPES.iter().find(|(m, _)| *m == mime) {
        return Some((*ext).to_string());
    }
    if mime.contains("json") {
        return Some("json".to_string());
    }
    if mime.contains("xml") {
        return Some("xml".to_string());
    }
    if mime.contains("text") {
        return Some(DEFAULT_EXTENSION.to_string());
    }
    None
}

fn extension_from_url(url: &str) -> Option<String> {
    let path = url_path(url);
    let last_segment = path.rsplit('/').next().unwrap_or_default();
    let (_, ext) = last_segment.rsplit_once('.')?;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Whether a body should be treated as binary rather than text.
///
/// A declared textual mime type (`text/*`, JSON, XML, JavaScript, form data)
/// means text and any other declared type means binary. Without a content
/// type, bodies that are not valid UTF-8 are binary.
pub fn is_binary_body(content_type: Option<&str>, body: &[u8]) -> bool {
    let mime = content_type.map(mime_type_part).unwrap_or_default();
    if mime.is_empty() {
        return std::str::from_utf8(body).is_err();
    }
    let textual = mime.starts_with("text/")
        || ["json", "xml", "javascript", "x-www-form-urlencoded"]
            .iter()
            .any(|t| mime.contains(t));
    !textual
}

/// Sniff a body: JSON documents get `json`, well-formed XML gets `xml`.
pub fn determine_text_file_extension(body: &[u8]) -> &'static str {
    let Ok(text) = std::str::from_utf8(body) else {
        return DEFAULT_EXTENSION;
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return DEFAULT_EXTENSION;
    }
    if serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return "json";
    }
    if trimmed.starts_with('<')
        && trimmed.ends_with('>')
        && sxd_document::parser::parse(trimmed).is_ok()
    {
        return "xml";
    }
    DEFAULT_EXTENSION
}
