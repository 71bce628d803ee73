//! Content type lookup by file extension.

use std::collections::HashMap;

pub const MIME_DEFAULT_BINARY: &str = "application/octet-stream";

const DEFAULT_TYPES: &[(&str, &str)] = &[
    ("gif", "image/gif"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("mp3", "audio/mpeg"),
    ("m3u", "audio/mpeg-url"),
    ("mp4", "video/mp4"),
    ("ogv", "video/ogg"),
    ("flv", "video/x-flv"),
    ("mov", "video/quicktime"),
];

/// Extension to MIME type table with a fallback type.
///
/// Keys are stored lowercase; lookups lowercase the extension first, so
/// `.JPG` and `.jpg` resolve identically.
#[derive(Debug, Clone)]
pub struct MimeTable {
    default_type: String,
    types: HashMap<String, String>,
}

impl MimeTable {
    pub fn new(default_type: &str) -> Self {
        Self {
            default_type: default_type.to_string(),
            types: HashMap::new(),
        }
    }

    pub fn with_type(mut self, extension: &str, mime_type: &str) -> Self {
        self.types
            .insert(extension.to_ascii_lowercase(), mime_type.to_string());
        self
    }

    /// Resolve the content type for `path` from the text after its last `.`.
    pub fn resolve(&self, path: &str) -> &str {
        path.rfind('.')
            .map(|dot| path[dot + 1..].to_ascii_lowercase())
            .and_then(|ext| self.types.get(&ext))
            .map(String::as_str)
            .unwrap_or(&self.default_type)
    }
}

impl Default for MimeTable {
    fn default() -> Self {
        DEFAULT_TYPES
            .iter()
            .fold(MimeTable::new(MIME_DEFAULT_BINARY), |table, (ext, mime)| {
                table.with_type(ext, mime)
            })
    }
}
