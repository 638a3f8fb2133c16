pub const FALLBACK_EXT: &str = "bin";
pub const FALLBACK_MIME: &str = "application/octet-stream";

// Shared table so the writer and filename lookup always agree on extensions.
const TABLE: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("image/svg+xml", "svg"),
    ("image/avif", "avif"),
    ("text/html", "html"),
    ("text/plain", "txt"),
    ("text/css", "css"),
    ("application/json", "json"),
    ("application/javascript", "js"),
    ("text/javascript", "js"),
    ("application/pdf", "pdf"),
    ("audio/mpeg", "mp3"),
    ("audio/ogg", "ogg"),
    ("video/mp4", "mp4"),
    ("video/webm", "webm"),
];

/// Media type with any parameters (charset etc.) stripped.
pub fn essence(mime_type: &str) -> &str {
    mime_type
        .split(';')
        .next()
        .unwrap_or(mime_type)
        .trim()
}

pub fn extension_for(mime_type: &str) -> &'static str {
    let essence = essence(mime_type).to_ascii_lowercase();
    TABLE
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, ext)| *ext)
        .unwrap_or(FALLBACK_EXT)
}

pub fn mime_for_extension(ext: &str) -> &'static str {
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    TABLE
        .iter()
        .find(|(_, table_ext)| *table_ext == ext)
        .map(|(mime, _)| *mime)
        .unwrap_or(FALLBACK_MIME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_types_map_both_ways() {
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("image/svg+xml"), "svg");
        assert_eq!(mime_for_extension("png"), "image/png");
        assert_eq!(mime_for_extension("html"), "text/html");
    }

    #[test]
    fn parameters_are_ignored() {
        assert_eq!(extension_for("text/html; charset=utf-8"), "html");
        assert_eq!(extension_for("TEXT/PLAIN"), "txt");
    }

    #[test]
    fn unknown_types_fall_back() {
        assert_eq!(extension_for("application/x-mystery"), FALLBACK_EXT);
        assert_eq!(mime_for_extension("xyz"), FALLBACK_MIME);
    }

    #[test]
    fn writer_and_lookup_agree() {
        // Every mime in the table resolves back to itself or to another entry
        // sharing the same extension.
        for (mime, ext) in TABLE {
            assert_eq!(extension_for(mime), *ext);
            assert_eq!(extension_for(mime_for_extension(ext)), *ext);
        }
    }
}
