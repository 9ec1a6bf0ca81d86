use std::path::Path;

use infer::{Infer, MatcherType};

/// Declared content types accepted by the intake.
pub fn is_image_mime(mime: &str) -> bool {
    mime.to_ascii_lowercase().starts_with("image/")
}

/// Sniffs the leading bytes of an upload. Returns `false` only when the bytes
/// positively identify a non-image type; unknown signatures are left to the decoder.
pub fn sniff_is_image(head: &[u8]) -> bool {
    match Infer::new().get(head) {
        Some(kind) => kind.matcher_type() == MatcherType::Image,
        None => true,
    }
}

/// Lower-cased extension of the client-supplied name, falling back to the
/// MIME subtype (`image/jpeg` -> `.jpeg`).
pub fn extension_for(original_name: &str, mime: &str) -> String {
    let from_name = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()));

    let ext = from_name.or_else(|| {
        mime.split('/')
            .nth(1)
            .map(|sub| sub.split(['+', ';']).next().unwrap_or(sub).trim().to_ascii_lowercase())
            .filter(|sub| !sub.is_empty() && sub.chars().all(|c| c.is_ascii_alphanumeric()))
    });

    ext.map(|e| format!(".{}", e)).unwrap_or_default()
}

/// Content type to serve a stored file with, judged by its extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("bmp") => "image/bmp",
        Some("avif") => "image/avif",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_prefers_original_name() {
        assert_eq!(extension_for("Photo.JPG", "image/jpeg"), ".jpg");
        assert_eq!(extension_for("scan", "image/png"), ".png");
        assert_eq!(extension_for("logo", "image/svg+xml"), ".svg");
        assert_eq!(extension_for("weird.j/g", "image/gif"), ".gif");
    }

    #[test]
    fn sniffing_flags_disguised_files() {
        let pdf = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3";
        let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
        assert!(!sniff_is_image(pdf));
        assert!(sniff_is_image(png));
        assert!(sniff_is_image(b"plain bytes"));
    }

    #[test]
    fn declared_mime_check_is_case_insensitive() {
        assert!(is_image_mime("IMAGE/PNG"));
        assert!(!is_image_mime("application/pdf"));
    }
}
