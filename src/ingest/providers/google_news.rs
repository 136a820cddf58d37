// src/ingest/providers/google_news.rs
//! Google News RSS search: query URLs and article-link decoding.
//!
//! Search results link to `news.google.com/rss/articles/<id>` redirects. Older
//! ids are base64url-encoded protobuf that carries the publisher URL inline;
//! newer opaque ids cannot be decoded offline and are kept as-is.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use url::Url;

const ARTICLE_ID: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// English/US search feed for `query` under `base` (the `/rss/search` endpoint).
pub fn search_url(base: &str, query: &str) -> String {
    format!(
        "{}?q={}&hl=en-US&gl=US&ceid=US:en",
        base.trim_end_matches('/'),
        urlencoding::encode(query)
    )
}

pub fn is_google_news(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.eq_ignore_ascii_case("news.google.com")))
        .unwrap_or(false)
}

/// Publisher URL embedded in a Google News article link, if it can be read.
pub fn decode_article_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if !parsed.host_str()?.eq_ignore_ascii_case("news.google.com") {
        return None;
    }
    let segments: Vec<&str> = parsed.path_segments()?.collect();
    let at = segments.iter().position(|s| *s == "articles" || *s == "read")?;
    let id = segments.get(at + 1)?;
    let bytes = ARTICLE_ID.decode(id).ok()?;

    let start = bytes.windows(4).position(|w| w == b"http")?;
    let end = bytes[start..]
        .iter()
        .position(|b| !(0x21..=0x7e).contains(b))
        .map_or(bytes.len(), |n| start + n);
    let candidate = std::str::from_utf8(&bytes[start..end]).ok()?;
    let decoded = Url::parse(candidate).ok()?;
    matches!(decoded.scheme(), "http" | "https").then(|| decoded.to_string())
}

/// The publisher URL when decodable, the original link otherwise.
pub fn resolve_article_url(url: &str) -> String {
    match decode_article_url(url) {
        Some(decoded) => decoded,
        None => {
            if is_google_news(url) {
                tracing::debug!(url, "google news link kept undecoded");
            }
            url.to_string()
        }
    }
}

/// Google's own placeholder artwork, never a useful thumbnail.
pub fn is_placeholder_image(url: &str) -> bool {
    url.contains("lh3.googleusercontent.com")
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    fn article_link(target: &str) -> String {
        let mut raw = vec![0x08, 0x13, 0x22, target.len() as u8];
        raw.extend_from_slice(target.as_bytes());
        raw.extend_from_slice(&[0xd2, 0x01, 0x00]);
        format!("https://news.google.com/rss/articles/{}?oc=5", URL_SAFE_NO_PAD.encode(raw))
    }

    #[test]
    fn inline_publisher_url_is_decoded() {
        let link = article_link("https://hybriddaily.test/2025/mcintyre-chicago");
        assert_eq!(
            decode_article_url(&link).as_deref(),
            Some("https://hybriddaily.test/2025/mcintyre-chicago")
        );
        assert_eq!(resolve_article_url(&link), "https://hybriddaily.test/2025/mcintyre-chicago");
    }

    #[test]
    fn opaque_and_foreign_links_are_kept() {
        let opaque = "https://news.google.com/rss/articles/AU_yqLPm9xZz?oc=5";
        assert_eq!(decode_article_url(opaque), None);
        assert_eq!(resolve_article_url(opaque), opaque);
        assert_eq!(resolve_article_url("https://boxrox.test/a"), "https://boxrox.test/a");
    }

    #[test]
    fn search_url_encodes_the_query() {
        assert_eq!(
            search_url("https://news.google.com/rss/search/", "lauren weeks hyrox"),
            "https://news.google.com/rss/search?q=lauren%20weeks%20hyrox&hl=en-US&gl=US&ceid=US:en"
        );
    }

    #[test]
    fn placeholder_images() {
        assert!(is_placeholder_image("https://lh3.googleusercontent.com/abc=s0-w300"));
        assert!(!is_placeholder_image("https://cdn.test/cover.jpg"));
    }
}
