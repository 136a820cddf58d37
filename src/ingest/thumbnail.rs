// src/ingest/thumbnail.rs
//! Fallback thumbnails from an article page's social meta tags.

use once_cell::sync::OnceCell;
use scraper::{Html, Selector};

use crate::ingest::http::HttpClient;
use crate::ingest::providers::google_news::is_placeholder_image;
use crate::ingest::resolve_link;

fn selectors() -> &'static [Selector; 3] {
    static SEL: OnceCell<[Selector; 3]> = OnceCell::new();
    SEL.get_or_init(|| {
        [
            Selector::parse(r#"meta[property="og:image"]"#).unwrap(),
            Selector::parse(r#"meta[name="twitter:image"]"#).unwrap(),
            Selector::parse(r#"meta[property="twitter:image"]"#).unwrap(),
        ]
    })
}

/// `og:image`, then `twitter:image`, resolved against `page_url`. Google
/// placeholder artwork is skipped.
pub fn extract_meta_image(html: &str, page_url: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    selectors().iter().find_map(|sel| {
        doc.select(sel)
            .filter_map(|el| el.value().attr("content"))
            .filter_map(|content| resolve_link(content, Some(page_url)))
            .find(|url| !is_placeholder_image(url))
    })
}

/// Fetch the page and look for a meta image. Failures are logged and yield `None`.
pub async fn fetch_meta_image(http: &HttpClient, page_url: &str) -> Option<String> {
    match http.get_text(page_url, &[], &[]).await {
        Ok(html) => extract_meta_image(&html, page_url),
        Err(e) => {
            tracing::debug!(url = page_url, error = %e, "thumbnail page fetch failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_og_image() {
        let html = r#"<html><head>
            <meta name="twitter:image" content="https://x.test/tw.jpg">
            <meta property="og:image" content="https://x.test/og.jpg">
        </head><body></body></html>"#;
        assert_eq!(
            extract_meta_image(html, "https://x.test/a").as_deref(),
            Some("https://x.test/og.jpg")
        );
    }

    #[test]
    fn falls_back_to_twitter_and_resolves_relative() {
        let html = r#"<head><meta name="twitter:image" content="/img/cover.png"></head>"#;
        assert_eq!(
            extract_meta_image(html, "https://x.test/posts/a").as_deref(),
            Some("https://x.test/img/cover.png")
        );
    }

    #[test]
    fn google_placeholder_is_skipped() {
        let html = r#"<head>
            <meta property="og:image" content="https://lh3.googleusercontent.com/J6_coFbogxhRI9iM864NL_liGXvsQp2AupsKei7z0cNNfDvGUmWUy20nuUhkREQyrpY4bEeIBuc=s0-w300">
            <meta name="twitter:image" content="https://x.test/real.jpg">
        </head>"#;
        assert_eq!(
            extract_meta_image(html, "https://x.test/a").as_deref(),
            Some("https://x.test/real.jpg")
        );
    }

    #[test]
    fn none_without_meta() {
        assert_eq!(extract_meta_image("<p>plain</p>", "https://x.test/"), None);
    }
}
