//! Data models shared by the scraper, the ad reader and the template engine.
//!
//! - [`Section`]: the four fixed regions of the newsletter
//! - [`HeadlineEntry`]: one scraped headline link
//! - [`AdEntry`]: one sponsor row from the ad spreadsheet
//! - [`SectionMap`]: rendered fragments per section for a single generation

use std::collections::BTreeMap;
use std::fmt;

/// Placeholder title used when no text can be recovered for a headline link.
pub const TITLE_NOT_FOUND: &str = "Title Not Found";

/// Line-break pair appended after every rendered headline.
pub const ENTRY_BREAK: &str = "<br><br>";

/// A named region of the newsletter.
///
/// The declaration order is the order ads are handed out in and the order
/// sections are iterated in a [`SectionMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    TopHeadlines,
    LeftColumn,
    MiddleColumn,
    RightColumn,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::TopHeadlines,
        Section::LeftColumn,
        Section::MiddleColumn,
        Section::RightColumn,
    ];

    /// The heading text that opens this section on the headline page.
    pub fn title(self) -> &'static str {
        match self {
            Section::TopHeadlines => "Top Headlines",
            Section::LeftColumn => "Left Column",
            Section::MiddleColumn => "Middle Column",
            Section::RightColumn => "Right Column",
        }
    }

    /// The template token replaced by this section's content.
    pub fn placeholder(self) -> &'static str {
        match self {
            Section::TopHeadlines => "{{TOP_HEADLINES}}",
            Section::LeftColumn => "{{LEFT_HEADLINES}}",
            Section::MiddleColumn => "{{MIDDLE_HEADLINES}}",
            Section::RightColumn => "{{RIGHT_HEADLINES}}",
        }
    }

    /// Match a heading's trimmed text exactly against the four section titles.
    pub fn from_heading(text: &str) -> Option<Section> {
        Section::ALL.into_iter().find(|s| s.title() == text)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// One headline link scraped from the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlineEntry {
    pub title: String,
    pub url: String,
}

impl HeadlineEntry {
    /// `{title} <a href="{url}" target="_blank">(link)</a><br><br>`
    pub fn render(&self) -> String {
        format!(
            "{} <a href=\"{}\" target=\"_blank\">(link)</a>{}",
            self.title, self.url, ENTRY_BREAK
        )
    }
}

/// One sponsor row from the ad spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdEntry {
    /// The "Ad Text" column.
    pub text: String,
    /// The "Ad Link" column.
    pub url: String,
}

impl AdEntry {
    /// Raw fragment handed to the ad formatter.
    pub fn render(&self) -> String {
        format!(
            "{} <a href=\"{}\" target=\"_blank\">(link)</a>",
            self.text, self.url
        )
    }
}

/// Rendered fragments per section for one generation request.
///
/// All four sections are always present, possibly empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionMap {
    sections: BTreeMap<Section, Vec<String>>,
}

impl Default for SectionMap {
    fn default() -> Self {
        Self {
            sections: Section::ALL.into_iter().map(|s| (s, Vec::new())).collect(),
        }
    }
}

impl SectionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, section: Section, fragment: String) {
        self.sections.entry(section).or_default().push(fragment);
    }

    pub fn get(&self, section: Section) -> &[String] {
        self.sections.get(&section).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All fragments of a section joined without separator.
    pub fn concat(&self, section: Section) -> String {
        self.get(section).concat()
    }

    /// True when no section holds any fragment.
    pub fn is_empty(&self) -> bool {
        self.sections.values().all(Vec::is_empty)
    }

    pub fn total_entries(&self) -> usize {
        self.sections.values().map(Vec::len).sum()
    }

    /// Remove the break pair from the last entry of every non-empty section.
    pub fn trim_trailing_breaks(&mut self) {
        for fragments in self.sections.values_mut() {
            if let Some(last) = fragments.last_mut() {
                if let Some(trimmed) = last.strip_suffix(ENTRY_BREAK) {
                    *last = trimmed.to_string();
                }
            }
        }
    }
}
