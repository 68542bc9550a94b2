use axum::http::{HeaderMap, header};

use crate::server::utils::url_utils::{TargetUrl, has_http_scheme};

pub const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

// both spellings players and origins actually send, compared lowercase
const MANIFEST_MIME_MARKERS: [&str; 2] = ["vnd.apple.mpegurl", "x-mpegurl"];
const MANIFEST_EXTENSION: &str = ".m3u8";
const BOM: char = '\u{feff}';

/// `.m3u8` on the url path, the query can't hide or fake it
pub fn has_manifest_extension(target: &TargetUrl) -> bool {
    target
        .url()
        .path()
        .to_ascii_lowercase()
        .ends_with(MANIFEST_EXTENSION)
}

/// true if the payload should be rewritten as a playlist instead of relayed as raw bytes
pub fn is_manifest(headers: &HeaderMap, target: &TargetUrl) -> bool {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    MANIFEST_MIME_MARKERS
        .iter()
        .any(|marker| content_type.contains(marker))
        || has_manifest_extension(target)
}

/// lexical kind of a single playlist line, nothing past the first character is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestLine<'a> {
    Blank,
    Directive,
    Proxied,
    AbsoluteUri(&'a str),
    RelativeUri(&'a str),
}

/// rewrites every uri line in a playlist so the player fetches it back through the proxy
pub struct ManifestRewriter {
    proxy_base_path: String,
}

impl ManifestRewriter {
    pub fn new(proxy_base_path: impl Into<String>) -> Self {
        Self {
            proxy_base_path: proxy_base_path.into(),
        }
    }

    fn proxied_prefix(&self) -> String {
        format!("{}?url=", self.proxy_base_path)
    }

    pub fn classify<'a>(&self, line: &'a str) -> ManifestLine<'a> {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            ManifestLine::Blank
        } else if trimmed.starts_with('#') {
            ManifestLine::Directive
        } else if trimmed.starts_with(&self.proxied_prefix()) {
            // already ours, wrapping it again would resolve the proxy path against the origin
            ManifestLine::Proxied
        } else if has_http_scheme(trimmed) {
            ManifestLine::AbsoluteUri(trimmed)
        } else {
            ManifestLine::RelativeUri(trimmed)
        }
    }

    /// `<base>?url=<percent encoded uri>`
    pub fn proxied_uri(&self, absolute: &str) -> String {
        format!("{}{}", self.proxied_prefix(), urlencoding::encode(absolute))
    }

    /// rewrite one line, depends only on the line and the base path
    pub fn rewrite_line(&self, line: &str, base_path: &str) -> String {
        // keep CRLF playlists CRLF
        let (content, line_ending) = match line.strip_suffix('\r') {
            Some(stripped) => (stripped, "\r"),
            None => (line, ""),
        };

        match self.classify(content) {
            ManifestLine::Blank | ManifestLine::Directive | ManifestLine::Proxied => {
                line.to_string()
            }
            ManifestLine::AbsoluteUri(uri) => {
                format!("{}{}", self.proxied_uri(uri), line_ending)
            }
            ManifestLine::RelativeUri(path) => {
                let absolute = format!("{}{}", base_path, path);
                format!("{}{}", self.proxied_uri(&absolute), line_ending)
            }
        }
    }

    pub fn rewrite(&self, manifest: &str, target: &TargetUrl) -> String {
        let base = base_path(target.as_str());
        // a leading BOM would glue itself to #EXTM3U and players reject the playlist
        let manifest = manifest.strip_prefix(BOM).unwrap_or(manifest);

        manifest
            .split('\n')
            .map(|line| self.rewrite_line(line, &base))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// target url cut right after its last `/`, ignoring query and fragment
pub fn base_path(target: &str) -> String {
    let without_query = target
        .find(['?', '#'])
        .map_or(target, |idx| &target[..idx]);

    let authority_start = without_query.find("://").map_or(0, |idx| idx + 3);

    match without_query[authority_start..].rfind('/') {
        Some(idx) => without_query[..authority_start + idx + 1].to_string(),
        // bare origin like http://host
        None => format!("{}/", without_query),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_path_truncates_after_last_slash() {
        assert_eq!(
            base_path("http://origin.example/live/index.m3u8"),
            "http://origin.example/live/"
        );
        assert_eq!(
            base_path("https://cdn.example/a/b/c.m3u8?token=x/y#frag"),
            "https://cdn.example/a/b/"
        );
        assert_eq!(base_path("http://origin.example"), "http://origin.example/");
        assert_eq!(base_path("http://origin.example/"), "http://origin.example/");
    }

    #[test]
    fn classify_is_purely_lexical() {
        let rewriter = ManifestRewriter::new("/proxy");

        assert_eq!(rewriter.classify("   "), ManifestLine::Blank);
        assert_eq!(rewriter.classify("#EXTINF:10,"), ManifestLine::Directive);
        assert_eq!(
            rewriter.classify("HTTPS://cdn.example/seg.ts"),
            ManifestLine::AbsoluteUri("HTTPS://cdn.example/seg.ts")
        );
        assert_eq!(
            rewriter.classify(" seg 1.ts "),
            ManifestLine::RelativeUri("seg 1.ts")
        );
        assert_eq!(
            rewriter.classify("/proxy?url=http%3A%2F%2Fa%2Fb.ts"),
            ManifestLine::Proxied
        );
    }
}
