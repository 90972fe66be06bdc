// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Upload content-type sniffing. Decoding, EXIF stripping and thumbnail
//! generation are media-transcoding concerns and out of scope; this
//! module only implements the pure decision rules a routing layer
//! applies to raw upload bytes, plus blurhash generation over an
//! already-decoded pixel buffer.

use crate::errors::{AmityError, AmityResult};

pub mod blurhash;

/// How many leading bytes of an upload are inspected for magic numbers.
pub const SNIFF_WINDOW: usize = 512;

/// Sniffs a MIME type from the first bytes of a file, independent of
/// any caller-supplied `Content-Type`. Falls back to
/// `application/octet-stream` when nothing matches.
pub fn sniff_content_type(bytes: &[u8]) -> &'static str {
    let window = &bytes[..bytes.len().min(SNIFF_WINDOW)];

    if window.starts_with(b"\x89PNG\r\n\x1a\n") {
        return "image/png";
    }
    if window.starts_with(b"\xFF\xD8\xFF") {
        return "image/jpeg";
    }
    if window.starts_with(b"GIF87a") || window.starts_with(b"GIF89a") {
        return "image/gif";
    }
    if window.len() >= 12 && &window[0..4] == b"RIFF" && &window[8..12] == b"WEBP" {
        return "image/webp";
    }
    if window.len() >= 12 && &window[0..4] == b"RIFF" && &window[8..12] == b"WAVE" {
        return "audio/wav";
    }
    if window.starts_with(b"BM") {
        return "image/bmp";
    }
    if window.starts_with(b"%PDF-") {
        return "application/pdf";
    }
    if window.starts_with(b"ID3") || window.starts_with(b"\xFF\xFB") || window.starts_with(b"\xFF\xF3") || window.starts_with(b"\xFF\xF2") {
        return "audio/mpeg";
    }
    if window.starts_with(b"OggS") {
        return "audio/ogg";
    }
    if window.len() >= 12 && &window[4..8] == b"ftyp" {
        return sniff_ftyp_brand(&window[8..12]);
    }
    if window.starts_with(b"\x1A\x45\xDF\xA3") {
        return "video/webm";
    }
    if contains_ascii_ci(window, b"<svg") {
        return "image/svg+xml";
    }
    if contains_ascii_ci(window, b"<!doctype html") || contains_ascii_ci(window, b"<html") {
        return "text/html";
    }

    "application/octet-stream"
}

fn sniff_ftyp_brand(brand: &[u8]) -> &'static str {
    match brand {
        b"M4A " | b"M4B " => "audio/mp4",
        b"qt  " => "video/quicktime",
        _ => "video/mp4",
    }
}

fn contains_ascii_ci(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() || haystack.len() < needle.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|window| window.eq_ignore_ascii_case(needle))
}

/// Whether `content_type` is one the caller is trusted to declare
/// rather than have it overridden by sniffing: any `image/*` except
/// `image/svg+xml`, plus `audio/*` and `video/*`.
fn is_caller_trusted_prefix(content_type: &str) -> bool {
    if content_type.eq_ignore_ascii_case("image/svg+xml") {
        return false;
    }
    let lower = content_type.to_ascii_lowercase();
    lower.starts_with("image/") || lower.starts_with("audio/") || lower.starts_with("video/")
}

/// Content types an upload may never resolve to, regardless of what the
/// caller declared: serving these back would let a "media" upload run
/// as a page or script in the browser.
fn is_disallowed(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    lower == "text/html" || lower == "image/svg+xml" || lower == "application/octet-stream"
}

/// Resolves the content type to store and serve an upload as: sniffs
/// the first [`SNIFF_WINDOW`] bytes, prefers `declared_content_type`
/// only when it falls in a caller-trusted prefix, and rejects the
/// upload outright if the resolved type would still be HTML, SVG or a
/// bare octet stream.
pub fn resolve_upload_content_type(bytes: &[u8], declared_content_type: Option<&str>) -> AmityResult<String> {
    let sniffed = sniff_content_type(bytes);

    if let Some(declared) = declared_content_type {
        if is_caller_trusted_prefix(declared) && !is_disallowed(declared) {
            return Ok(declared.to_string());
        }
    }

    if is_disallowed(sniffed) {
        return Err(AmityError::BadRequest { reason: format!("uploaded file's content could not be identified as an allowed media type (sniffed as {sniffed})") });
    }

    Ok(sniffed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_known_signatures() {
        assert_eq!(sniff_content_type(b"\x89PNG\r\n\x1a\nrest"), "image/png");
        assert_eq!(sniff_content_type(b"\xFF\xD8\xFFrest"), "image/jpeg");
        assert_eq!(sniff_content_type(b"GIF89arest"), "image/gif");
        assert_eq!(sniff_content_type(b"RIFF\x00\x00\x00\x00WEBPrest"), "image/webp");
        assert_eq!(sniff_content_type(b"%PDF-1.7"), "application/pdf");
        assert_eq!(sniff_content_type(b"OggSrest"), "audio/ogg");
        assert_eq!(sniff_content_type(b"unknown bytes"), "application/octet-stream");
    }

    #[test]
    fn sniffs_html_and_svg_as_disallowed_categories() {
        assert_eq!(sniff_content_type(b"<!DOCTYPE html><html></html>"), "text/html");
        assert_eq!(sniff_content_type(b"<svg xmlns='http://www.w3.org/2000/svg'></svg>"), "image/svg+xml");
    }

    #[test]
    fn caller_content_type_preferred_for_safe_prefixes() {
        let png_bytes = b"\x89PNG\r\n\x1a\nrest";
        let resolved = resolve_upload_content_type(png_bytes, Some("image/jpeg")).unwrap();
        assert_eq!(resolved, "image/jpeg");
    }

    #[test]
    fn caller_content_type_ignored_for_svg() {
        let png_bytes = b"\x89PNG\r\n\x1a\nrest";
        let resolved = resolve_upload_content_type(png_bytes, Some("image/svg+xml")).unwrap();
        assert_eq!(resolved, "image/png");
    }

    #[test]
    fn caller_content_type_ignored_outside_safe_prefixes() {
        let png_bytes = b"\x89PNG\r\n\x1a\nrest";
        let resolved = resolve_upload_content_type(png_bytes, Some("text/plain")).unwrap();
        assert_eq!(resolved, "image/png");
    }

    #[test]
    fn html_upload_with_no_declared_type_is_rejected() {
        let result = resolve_upload_content_type(b"<!DOCTYPE html><html></html>", None);
        assert!(result.is_err());
    }

    #[test]
    fn unidentifiable_upload_is_rejected() {
        let result = resolve_upload_content_type(b"\x00\x01\x02garbage", None);
        assert!(result.is_err());
    }

    #[test]
    fn legit_audio_upload_with_declared_type_is_accepted() {
        let mp3_bytes = b"ID3\x03\x00\x00\x00rest";
        let resolved = resolve_upload_content_type(mp3_bytes, Some("audio/mpeg")).unwrap();
        assert_eq!(resolved, "audio/mpeg");
    }
}
