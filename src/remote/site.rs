//! Personal-site text extraction
//!
//! Reduces a fetched HTML page to its visible text so it can be stored on
//! the node and handed to the scoring oracle.

use scraper::{Html, Selector};
use url::Url;

/// Elements whose text content is never visible
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Turns a profile's free-form blog field into a fetchable URL
///
/// Profiles often omit the scheme (`example.dev`), so https is assumed.
/// Returns None for empty values and non-http(s) schemes.
pub fn normalize_site_url(blog: &str) -> Option<Url> {
    let trimmed = blog.trim();
    if trimmed.is_empty() {
        return None;
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate).ok()?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Some(url),
        _ => None,
    }
}

/// Extracts the visible text of an HTML document
///
/// The title (if any) comes first, followed by the body text with
/// whitespace collapsed. The result is cut at `max_chars` characters.
pub fn extract_site_text(html: &str, max_chars: usize) -> String {
    let document = Html::parse_document(html);
    let mut words: Vec<&str> = Vec::new();

    if let Ok(title_selector) = Selector::parse("title") {
        if let Some(title) = document.select(&title_selector).next() {
            words.extend(title.text().flat_map(|t| t.split_whitespace()));
        }
    }

    if let Ok(body_selector) = Selector::parse("body") {
        if let Some(body) = document.select(&body_selector).next() {
            for node in body.descendants() {
                let Some(text) = node.value().as_text() else {
                    continue;
                };

                let hidden = node
                    .parent()
                    .and_then(|parent| parent.value().as_element())
                    .map(|element| HIDDEN_ELEMENTS.contains(&element.name()))
                    .unwrap_or(false);

                if !hidden {
                    words.extend(text.split_whitespace());
                }
            }
        }
    }

    let joined = words.join(" ");
    match joined.char_indices().nth(max_chars) {
        Some((cut, _)) => joined[..cut].to_string(),
        None => joined,
    }
}
