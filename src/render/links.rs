//! HTML parser for extracting links and subresources
//!
//! Used by the HTTP backend to find what a browser would have requested, and
//! by the Chrome backend as a fallback when in-page link evaluation fails.

use scraper::{Html, Selector};
use url::Url;

/// `<link rel>` values whose target a browser downloads on page load
const FETCHED_LINK_RELS: &[&str] = &[
    "stylesheet",
    "icon",
    "shortcut",
    "apple-touch-icon",
    "preload",
    "modulepreload",
    "manifest",
];

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Hyperlinks found on the page (absolute URLs)
    pub links: Vec<String>,

    /// Subresources a browser would fetch while loading the page
    pub assets: Vec<String>,
}

/// Parses HTML content and extracts hyperlinks and subresources
///
/// # Extraction Rules
///
/// **Links:** every `<a href="...">`, including `rel="nofollow"` and
/// `download` anchors.
///
/// **Assets:** `<img src>`, `<script src>`, `<source src>`, `<video src>`,
/// `<audio src>`, `<video poster>`, and `<link href>` whose `rel` is a kind
/// the browser downloads (stylesheet, icon, preload, manifest).
///
/// `javascript:`, `mailto:`, `tel:`, `data:` and fragment-only references
/// are skipped, as is anything that does not resolve to http(s).
///
/// # Example
///
/// ```
/// use site_mirror::render::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);
    let base_url = document_base(&document, base_url);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, &base_url),
        assets: extract_assets(&document, &base_url),
    }
}

/// Convenience function for extracting just the hyperlinks from HTML
pub fn extract_links_simple(html: &str, base_url: &Url) -> Vec<String> {
    parse_html(html, base_url).links
}

/// Honors `<base href>` when present
fn document_base(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|element| element.value().attr("href"))
                .and_then(|href| page_url.join(href.trim()).ok())
        })
        .unwrap_or_else(|| page_url.clone())
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    select_attr(document, "a[href]", "href", base_url)
}

fn extract_assets(document: &Html, base_url: &Url) -> Vec<String> {
    let mut assets = Vec::new();

    for (selector, attr) in [
        ("img[src]", "src"),
        ("script[src]", "src"),
        ("source[src]", "src"),
        ("video[src]", "src"),
        ("audio[src]", "src"),
        ("video[poster]", "poster"),
    ] {
        assets.extend(select_attr(document, selector, attr, base_url));
    }

    if let Ok(link_selector) = Selector::parse("link[href][rel]") {
        for element in document.select(&link_selector) {
            let rel = element.value().attr("rel").unwrap_or("").to_ascii_lowercase();
            let fetched = rel
                .split_ascii_whitespace()
                .any(|token| FETCHED_LINK_RELS.contains(&token));
            if !fetched {
                continue;
            }

            if let Some(absolute_url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, base_url))
            {
                assets.push(absolute_url);
            }
        }
    }

    assets
}

fn select_attr(document: &Html, selector: &str, attr: &str, base_url: &Url) -> Vec<String> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr(attr))
        .filter_map(|value| resolve_link(value, base_url))
        .collect()
}

/// Resolves a reference to an absolute http(s) URL
///
/// Returns None if the reference should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only anchors
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => {
            Some(absolute_url.to_string())
        }
        _ => None,
    }
}
