//! Template assembly: merging headlines and ads into the email template.
//!
//! The template is an HTML file carrying five tokens:
//!
//! | Token | Replaced with |
//! |-------|---------------|
//! | `{{TOP_HEADLINES}}` | Top Headlines section |
//! | `{{LEFT_HEADLINES}}` | Left Column section |
//! | `{{MIDDLE_HEADLINES}}` | Middle Column section |
//! | `{{RIGHT_HEADLINES}}` | Right Column section |
//! | `{{CURRENT_DATE}}` | Today's date as `M/D/YYYY` |
//!
//! Tokens missing from the template are skipped, and any other `{{...}}` text
//! is left as is.
//!
//! # Ad placement
//!
//! Ads are shuffled and handed out one per section in section order. With
//! fewer ads than sections the trailing sections get none; extra ads are
//! dropped.

use crate::ads::format_ads;
use crate::error::NewsletterError;
use crate::models::{Section, SectionMap};
use chrono::{Local, NaiveDate};
use rand::Rng;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument, warn};

pub const DATE_PLACEHOLDER: &str = "{{CURRENT_DATE}}";

/// `M/D/YYYY` without zero padding, e.g. `3/7/2025`.
pub fn newsletter_date(date: NaiveDate) -> String {
    date.format("%-m/%-d/%Y").to_string()
}

/// Distribute formatted ads over the sections and substitute every token.
///
/// The shuffle draws from `rng`; production passes the thread RNG, tests a
/// seeded one.
pub fn assemble<R: Rng + ?Sized>(
    template: &str,
    mut sections: SectionMap,
    mut ads: Vec<String>,
    date: NaiveDate,
    rng: &mut R,
) -> String {
    ads.shuffle(rng);
    for (section, ad) in Section::ALL.into_iter().zip(ads) {
        sections.push(section, ad);
    }

    let mut replacements: Vec<(&str, String)> = Section::ALL
        .into_iter()
        .map(|section| (section.placeholder(), sections.concat(section)))
        .collect();
    replacements.push((DATE_PLACEHOLDER, newsletter_date(date)));

    substitute(template, &replacements)
}

/// Replace tokens in a single left-to-right pass over `template`.
///
/// Inserted text is never rescanned, so a token that appears inside a
/// headline stays literal.
fn substitute(template: &str, replacements: &[(&str, String)]) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find("{{") {
        output.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match replacements.iter().find(|(token, _)| tail.starts_with(token)) {
            Some((token, value)) => {
                output.push_str(value);
                rest = &tail[token.len()..];
            }
            None => {
                output.push('{');
                rest = &tail[1..];
            }
        }
    }
    output.push_str(rest);
    output
}

/// Read the template, format and place the ads, and write the finished email.
///
/// The email is written to a temporary sibling file and renamed over
/// `output_path`, so a failed write never leaves a half-written email behind.
///
/// # Errors
///
/// - [`NewsletterError::TemplateIo`] if the template cannot be read or the
///   output cannot be written
/// - [`NewsletterError::MalformedAdFragment`] if a raw ad is not in the shape
///   the ad reader produces
#[instrument(level = "info", skip(sections, raw_ads), fields(ads = raw_ads.len()))]
pub async fn insert_data_into_template(
    template_path: &Path,
    output_path: &Path,
    sections: SectionMap,
    raw_ads: Vec<String>,
) -> Result<PathBuf, NewsletterError> {
    let template = fs::read_to_string(template_path).await.map_err(|source| {
        error!(path = %template_path.display(), error = %source, "Error reading template file");
        NewsletterError::TemplateIo {
            path: template_path.to_path_buf(),
            source,
        }
    })?;

    let ads = format_ads(&raw_ads)?;
    let placed = ads.len().min(Section::ALL.len());
    let today = Local::now().date_naive();
    let email = assemble(&template, sections, ads, today, &mut rand::rng());

    write_atomically(output_path, &email).await?;
    info!(
        path = %output_path.display(),
        bytes = email.len(),
        ads_placed = placed,
        "Wrote email"
    );
    Ok(output_path.to_path_buf())
}

async fn write_atomically(path: &Path, contents: &str) -> Result<(), NewsletterError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "email.html".to_string());
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

    let result = match fs::write(&tmp_path, contents).await {
        Ok(()) => fs::rename(&tmp_path, path).await,
        Err(e) => Err(e),
    };

    let Err(source) = result else {
        return Ok(());
    };
    error!(path = %path.display(), error = %source, "Failed writing email");

    if let Err(e) = fs::remove_file(&tmp_path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(
                path = %tmp_path.display(),
                error = %e,
                "Failed removing temporary email file"
            );
        }
    }
    Err(NewsletterError::TemplateIo {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a generated email back for upload. An empty file counts as missing.
#[instrument(level = "info")]
pub async fn read_generated_email(path: &Path) -> Result<String, NewsletterError> {
    let html = fs::read_to_string(path)
        .await
        .map_err(|source| NewsletterError::TemplateIo {
            path: path.to_path_buf(),
            source,
        })?;
    if html.trim().is_empty() {
        return Err(NewsletterError::TemplateIo {
            path: path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "email file is empty",
            ),
        });
    }
    Ok(html)
}
