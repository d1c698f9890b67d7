//! Headline page scraper.
//!
//! The headline page is a plain HTML listing where each newsletter section is
//! introduced by an `h2` whose text is the section name, followed by the links
//! that belong to it:
//!
//! ```html
//! <h2>Top Headlines</h2>
//! <p>Budget Passes <a href="https://x.com/a">link</a></p>
//! <h2>Left Column</h2>
//! ...
//! ```
//!
//! # Title recovery
//!
//! The page does not put the headline inside the anchor, so the title is taken
//! from the text node right before the link. When there is none, the title is
//! the parent element's text with the URL cut out, and failing that
//! [`TITLE_NOT_FOUND`].
//!
//! # Unrecognized headings
//!
//! An `h2` that is not one of the four section names does not close the
//! current section. Links under it are attributed to the last recognized
//! section.

use crate::error::NewsletterError;
use crate::models::{HeadlineEntry, Section, SectionMap, TITLE_NOT_FOUND};
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument};

static HEADING_OR_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("h2, a").unwrap());

/// Fetch the headline page and extract its sections.
///
/// # Errors
///
/// [`NewsletterError::SourceUnavailable`] when the request fails or the
/// server answers with a non-success status. Callers treat that as "no
/// headlines available".
#[instrument(level = "info", skip(client))]
pub async fn scrape_headlines(client: &Client, url: &str) -> Result<SectionMap, NewsletterError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| NewsletterError::source_unavailable("headline page", e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(NewsletterError::source_unavailable(
            "headline page",
            format!("HTTP {status}"),
        ));
    }

    let html = response
        .text()
        .await
        .map_err(|e| NewsletterError::source_unavailable("headline page", e))?;

    let sections = extract_sections(&html);
    info!(
        bytes = html.len(),
        entries = sections.total_entries(),
        source = url,
        "Scraped headline page"
    );
    Ok(sections)
}

/// Walk `h2` and `a` elements in document order and collect rendered
/// headline entries per section.
pub fn extract_sections(html: &str) -> SectionMap {
    let document = Html::parse_document(html);
    let mut sections = SectionMap::new();
    let mut current: Option<Section> = None;

    for element in document.select(&HEADING_OR_LINK) {
        match element.value().name() {
            "h2" => {
                let heading = element.text().collect::<String>();
                match Section::from_heading(heading.trim()) {
                    Some(section) => current = Some(section),
                    None => debug!(
                        heading = heading.trim(),
                        ?current,
                        "Ignoring unrecognized heading"
                    ),
                }
            }
            _ => {
                let Some(section) = current else { continue };
                let Some(href) = element.value().attr("href") else { continue };
                let url = href.trim();
                let entry = HeadlineEntry {
                    title: link_title(element, url),
                    url: url.to_string(),
                };
                sections.push(section, entry.render());
            }
        }
    }

    sections.trim_trailing_breaks();
    sections
}

/// Recover the display title for a link.
fn link_title(link: ElementRef<'_>, url: &str) -> String {
    let preceding_text = link
        .prev_sibling()
        .and_then(|node| node.value().as_text().map(|text| text.trim().to_string()));

    let title = match preceding_text {
        Some(text) => text,
        None => link
            .parent()
            .and_then(ElementRef::wrap)
            .map(|parent| parent_text_without_url(parent, url))
            .unwrap_or_default(),
    };

    if title.is_empty() {
        TITLE_NOT_FOUND.to_string()
    } else {
        title
    }
}

/// The parent's visible text, each piece trimmed and joined without a
/// separator, with the link target removed.
fn parent_text_without_url(parent: ElementRef<'_>, url: &str) -> String {
    let text = parent
        .text()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect::<String>();
    if url.is_empty() {
        text.trim().to_string()
    } else {
        text.replace(url, "").trim().to_string()
    }
}
