//! Headline source scrapers.
//!
//! The newsletter pulls its headlines from a single page that lays links out
//! under `h2` section headings. Scraping is split the same way for every
//! source:
//!
//! 1. **Fetching**: download the page, mapping transport errors and non-success
//!    statuses to [`NewsletterError::SourceUnavailable`](crate::error::NewsletterError)
//! 2. **Extraction**: walk the parsed document and build a
//!    [`SectionMap`](crate::models::SectionMap) of rendered entries
//!
//! Extraction is a pure function over the page markup so it can be tested
//! without network access.

pub mod headlines;
