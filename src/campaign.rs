//! Campaign lifecycle against the Mailchimp Marketing API.
//!
//! # Architecture
//!
//! - [`CampaignApi`]: the three lifecycle calls the operator flow needs
//! - [`MailchimpClient`]: the HTTP implementation over Mailchimp's v3 REST API
//!
//! The session handlers only see the trait, so the flow can be exercised
//! without a Mailchimp account.
//!
//! # Failure semantics
//!
//! Each call is attempted once. A failure is reported as
//! [`NewsletterError::CampaignApi`] naming the step; earlier steps are not
//! rolled back (a created campaign stays in Mailchimp if setting its content
//! fails).

use crate::error::NewsletterError;
use chrono::{Datelike, Local, NaiveDate};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{error, info, instrument};

/// Create, fill and send a campaign.
pub trait CampaignApi {
    /// Create a regular campaign with the given subject line and return its id.
    async fn create_campaign(&self, subject_line: &str) -> Result<String, NewsletterError>;

    /// Upload the HTML body of an existing campaign.
    async fn set_content(&self, campaign_id: &str, html: &str) -> Result<(), NewsletterError>;

    /// Send an existing campaign to its audience now.
    async fn send(&self, campaign_id: &str) -> Result<(), NewsletterError>;
}

/// Account and sender details for campaign creation.
#[derive(Clone)]
pub struct MailchimpSettings {
    pub api_key: String,
    /// Data-center prefix of the account, e.g. `us20`.
    pub server_prefix: String,
    /// Audience (list) the campaign is sent to.
    pub audience_id: String,
    pub from_name: String,
    pub reply_to: String,
}

impl fmt::Debug for MailchimpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailchimpSettings")
            .field("api_key", &"<redacted>")
            .field("server_prefix", &self.server_prefix)
            .field("audience_id", &self.audience_id)
            .field("from_name", &self.from_name)
            .field("reply_to", &self.reply_to)
            .finish()
    }
}

/// Internal campaign title, e.g. `3 7 2025 blast`.
pub fn campaign_title(date: NaiveDate) -> String {
    format!("{} {} {} blast", date.month(), date.day(), date.year())
}

#[derive(Debug, Serialize)]
struct NewCampaign<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    recipients: Recipients<'a>,
    settings: CampaignSettings<'a>,
}

#[derive(Debug, Serialize)]
struct Recipients<'a> {
    list_id: &'a str,
}

#[derive(Debug, Serialize)]
struct CampaignSettings<'a> {
    subject_line: &'a str,
    title: String,
    from_name: &'a str,
    reply_to: &'a str,
}

#[derive(Debug, Serialize)]
struct CampaignContent<'a> {
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreatedCampaign {
    id: String,
}

/// Mailchimp's problem-detail error body.
#[derive(Debug, Default, Deserialize)]
struct ApiProblem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

/// [`CampaignApi`] over `https://{server_prefix}.api.mailchimp.com/3.0`.
pub struct MailchimpClient {
    http: Client,
    base_url: String,
    settings: MailchimpSettings,
}

impl fmt::Debug for MailchimpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailchimpClient")
            .field("base_url", &self.base_url)
            .field("settings", &self.settings)
            .finish()
    }
}

impl MailchimpClient {
    pub fn new(http: Client, settings: MailchimpSettings) -> Self {
        let base_url = format!("https://{}.api.mailchimp.com/3.0", settings.server_prefix);
        Self {
            http,
            base_url,
            settings,
        }
    }

    fn campaign_url(&self, campaign_id: &str, suffix: &str) -> String {
        format!(
            "{}/campaigns/{}{}",
            self.base_url,
            urlencoding::encode(campaign_id),
            suffix
        )
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth("newsletter_machine", Some(&self.settings.api_key))
    }

    /// Send a request and turn transport errors and non-success statuses into
    /// [`NewsletterError::CampaignApi`] for `step`.
    async fn execute(
        &self,
        step: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, NewsletterError> {
        let t0 = Instant::now();
        let response = self.authed(request).send().await.map_err(|e| {
            error!(step, error = %e, "Mailchimp request failed");
            NewsletterError::campaign(step, e)
        })?;

        let status = response.status();
        let elapsed_ms = t0.elapsed().as_millis() as u64;
        if status.is_success() {
            info!(step, %status, elapsed_ms, "Mailchimp call succeeded");
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let problem = serde_json::from_str::<ApiProblem>(&body).unwrap_or_default();
        let reason = match (problem.title, problem.detail) {
            (Some(title), Some(detail)) => format!("HTTP {status}: {title}: {detail}"),
            (Some(msg), None) | (None, Some(msg)) => format!("HTTP {status}: {msg}"),
            (None, None) => format!("HTTP {status}"),
        };
        error!(step, %status, elapsed_ms, %reason, "Mailchimp call rejected");
        Err(NewsletterError::campaign(step, reason))
    }
}

impl CampaignApi for MailchimpClient {
    #[instrument(level = "info", skip(self))]
    async fn create_campaign(&self, subject_line: &str) -> Result<String, NewsletterError> {
        let body = NewCampaign {
            kind: "regular",
            recipients: Recipients {
                list_id: &self.settings.audience_id,
            },
            settings: CampaignSettings {
                subject_line,
                title: campaign_title(Local::now().date_naive()),
                from_name: &self.settings.from_name,
                reply_to: &self.settings.reply_to,
            },
        };

        let request = self
            .http
            .post(format!("{}/campaigns", self.base_url))
            .json(&body);
        let response = self.execute("creation", request).await?;
        let created: CreatedCampaign = response
            .json()
            .await
            .map_err(|e| NewsletterError::campaign("creation", e))?;

        info!(campaign_id = %created.id, title = %body.settings.title, "Created campaign");
        Ok(created.id)
    }

    #[instrument(level = "info", skip(self, html), fields(bytes = html.len()))]
    async fn set_content(&self, campaign_id: &str, html: &str) -> Result<(), NewsletterError> {
        let request = self
            .http
            .put(self.campaign_url(campaign_id, "/content"))
            .json(&CampaignContent { html });
        self.execute("content upload", request).await?;
        Ok(())
    }

    #[instrument(level = "info", skip(self))]
    async fn send(&self, campaign_id: &str) -> Result<(), NewsletterError> {
        let request = self
            .http
            .post(self.campaign_url(campaign_id, "/actions/send"));
        self.execute("send", request).await?;
        Ok(())
    }
}
