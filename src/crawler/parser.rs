//! HTML parser for extracting raw links
//!
//! Links are returned exactly as written in the document (trimmed). Resolving
//! them against the page URI, and deciding which ones are malformed, is left
//! to the crawl loop.

use scraper::{Html, Selector};

/// Extracts every link target from an HTML document
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` anywhere in the document
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - Empty `href` attributes
/// - Stylesheets, scripts and images
///
/// # Example
///
/// ```
/// use sitewalk::crawler::extract_links;
///
/// let html = r#"<html><body><a href="/page">Link</a><a href="">Self</a></body></html>"#;
/// assert_eq!(extract_links(html), vec!["/page".to_string()]);
/// ```
pub fn extract_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if let Some(href) = element.value().attr("href") {
                push_href(&mut links, href);
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(href) = element.value().attr("href") {
                push_href(&mut links, href);
            }
        }
    }

    links
}

fn push_href(links: &mut Vec<String>, href: &str) {
    let href = href.trim();
    if !href.is_empty() {
        links.push(href.to_string());
    }
}
