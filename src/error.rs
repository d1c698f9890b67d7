//! Error taxonomy for the newsletter pipeline.
//!
//! Every boundary (remote fetch, template file I/O, Mailchimp call) maps its
//! failure into one [`NewsletterError`] variant. Each variant's message names
//! the step that failed so the operator can tell them apart.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NewsletterError {
    /// The headline page or the ad spreadsheet could not be fetched or read.
    #[error("{source_name} unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// The template could not be read or the generated email could not be written.
    #[error("template I/O failed for {}: {source}", .path.display())]
    TemplateIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A Mailchimp lifecycle call failed.
    #[error("campaign {step} failed: {reason}")]
    CampaignApi { step: &'static str, reason: String },

    /// A raw ad fragment did not have the `text <a href="...">` shape the reader produces.
    #[error("malformed ad fragment: {0}")]
    MalformedAdFragment(String),

    #[error("enter a subject line before creating a campaign")]
    MissingSubjectLine,

    #[error("no email has been generated yet; generate the email first")]
    EmailNotGenerated,

    #[error("no campaign has been created yet")]
    NoCampaign,

    #[error("sending was not confirmed")]
    SendNotConfirmed,

    #[error("configuration error: {reason}")]
    Config { reason: String },
}

impl NewsletterError {
    pub fn source_unavailable(source_name: &str, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn campaign(step: &'static str, reason: impl ToString) -> Self {
        Self::CampaignApi {
            step,
            reason: reason.to_string(),
        }
    }
}
