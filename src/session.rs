//! Operator session and the action handlers of the four-step flow.
//!
//! The flow is strictly sequential:
//!
//! 1. Load ads (read-only, does not touch the session)
//! 2. Generate the email: resets the session, sets `email_generated` on success
//! 3. Create a campaign: needs a subject line and a generated email; stores
//!    the campaign id and subject on success
//! 4. Send: needs a campaign id and an explicit confirmation
//!
//! Each handler takes the session by value and hands it back next to its
//! result, so the caller always holds the current state even when a step
//! fails.

use crate::campaign::CampaignApi;
use crate::error::NewsletterError;
use crate::models::SectionMap;
use crate::template::{insert_data_into_template, read_generated_email};
use crate::utils::truncate_for_log;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, instrument, warn};

/// State carried between operator actions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// An email file was written by the latest generation.
    pub email_generated: bool,
    /// Campaign created from that email, once step 3 succeeded.
    pub campaign_id: Option<String>,
    pub subject_line: String,
}

/// A handler's outcome together with the session to continue with.
pub type Step<T> = (Session, Result<T, NewsletterError>);

/// Step 2: write the email from already fetched headlines and ads.
///
/// Starts from a fresh session. Missing headlines halt generation; missing ads
/// only produce a warning.
#[instrument(
    level = "info",
    skip_all,
    fields(template = %template_path.display(), output = %output_path.display())
)]
pub async fn generate_email(
    previous: Session,
    headlines: Result<SectionMap, NewsletterError>,
    raw_ads: Vec<String>,
    template_path: &Path,
    output_path: &Path,
) -> Step<PathBuf> {
    debug!(?previous, "Resetting session for a new generation");
    let mut session = Session::default();

    let headlines = match headlines {
        Ok(sections) if !sections.is_empty() => sections,
        Ok(_) => {
            error!("No headlines found on the source page");
            return (
                session,
                Err(NewsletterError::source_unavailable(
                    "headline page",
                    "no headlines found",
                )),
            );
        }
        Err(e) => {
            error!(error = %e, "No headlines available");
            return (session, Err(e));
        }
    };

    if raw_ads.is_empty() {
        warn!("No ads found, proceeding without ads");
    }

    match insert_data_into_template(template_path, output_path, headlines, raw_ads).await {
        Ok(path) => {
            session.email_generated = true;
            info!(path = %path.display(), "Email template generated");
            (session, Ok(path))
        }
        Err(e) => (session, Err(e)),
    }
}

/// Step 3: create a campaign and upload the generated email as its content.
///
/// A campaign whose content upload fails is left in Mailchimp and the session
/// keeps no id for it.
#[instrument(level = "info", skip(session, api), fields(output = %output_path.display()))]
pub async fn create_campaign<A: CampaignApi>(
    session: Session,
    api: &A,
    subject_line: &str,
    output_path: &Path,
) -> Step<String> {
    let subject_line = subject_line.trim();
    if subject_line.is_empty() {
        return (session, Err(NewsletterError::MissingSubjectLine));
    }
    if !session.email_generated {
        return (session, Err(NewsletterError::EmailNotGenerated));
    }

    let html = match read_generated_email(output_path).await {
        Ok(html) => html,
        Err(e) => return (session, Err(e)),
    };
    debug!(preview = %truncate_for_log(&html, 200), "Uploading email");

    let campaign_id = match api.create_campaign(subject_line).await {
        Ok(id) => id,
        Err(e) => return (session, Err(e)),
    };

    if let Err(e) = api.set_content(&campaign_id, &html).await {
        warn!(%campaign_id, "Campaign was created but its content was not set");
        return (session, Err(e));
    }

    info!(%campaign_id, subject_line, "Campaign created");
    let session = Session {
        campaign_id: Some(campaign_id.clone()),
        subject_line: subject_line.to_string(),
        ..session
    };
    (session, Ok(campaign_id))
}

/// Step 4: send the session's campaign. Requires `confirmed`.
#[instrument(level = "info", skip(session, api), fields(campaign_id = ?session.campaign_id))]
pub async fn send_campaign<A: CampaignApi>(session: Session, api: &A, confirmed: bool) -> Step<()> {
    let Some(campaign_id) = session.campaign_id.clone() else {
        return (session, Err(NewsletterError::NoCampaign));
    };
    if !confirmed {
        return (session, Err(NewsletterError::SendNotConfirmed));
    }

    match api.send(&campaign_id).await {
        Ok(()) => {
            info!(%campaign_id, subject_line = %session.subject_line, "Campaign sent");
            (session, Ok(()))
        }
        Err(e) => (session, Err(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HeadlineEntry, Section};
    use std::sync::Mutex;

    /// Records calls and fails the steps it is told to fail.
    #[derive(Default)]
    struct FakeApi {
        calls: Mutex<Vec<String>>,
        fail_create: bool,
        fail_content: bool,
        fail_send: bool,
    }

    impl FakeApi {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CampaignApi for FakeApi {
        async fn create_campaign(&self, subject_line: &str) -> Result<String, NewsletterError> {
            self.calls.lock().unwrap().push(format!("create:{subject_line}"));
            if self.fail_create {
                return Err(NewsletterError::campaign("creation", "HTTP 400"));
            }
            Ok("cmp-1".to_string())
        }

        async fn set_content(&self, campaign_id: &str, html: &str) -> Result<(), NewsletterError> {
            self.calls.lock().unwrap().push(format!("content:{campaign_id}:{}", html.len()));
            if self.fail_content {
                return Err(NewsletterError::campaign("content upload", "HTTP 500"));
            }
            Ok(())
        }

        async fn send(&self, campaign_id: &str) -> Result<(), NewsletterError> {
            self.calls.lock().unwrap().push(format!("send:{campaign_id}"));
            if self.fail_send {
                return Err(NewsletterError::campaign("send", "HTTP 403"));
            }
            Ok(())
        }
    }

    fn headlines() -> SectionMap {
        let mut sections = SectionMap::new();
        let entry = HeadlineEntry {
            title: "Budget Passes".to_string(),
            url: "https://x.com/a".to_string(),
        };
        sections.push(Section::TopHeadlines, entry.render());
        sections.trim_trailing_breaks();
        sections
    }

    fn generated() -> Session {
        Session {
            email_generated: true,
            ..Session::default()
        }
    }

    struct Files {
        _dir: tempfile::TempDir,
        template: PathBuf,
        output: PathBuf,
    }

    fn files() -> Files {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("template.html");
        let output = dir.path().join("Updated_Email_Template.html");
        std::fs::write(&template, "<p>{{TOP_HEADLINES}}</p><p>{{CURRENT_DATE}}</p>").unwrap();
        Files {
            _dir: dir,
            template,
            output,
        }
    }

    #[tokio::test]
    async fn test_generate_without_ads_succeeds_and_resets_session() {
        let f = files();
        let previous = Session {
            email_generated: true,
            campaign_id: Some("old".to_string()),
            subject_line: "Old".to_string(),
        };
        let (session, result) =
            generate_email(previous, Ok(headlines()), Vec::new(), &f.template, &f.output).await;

        assert_eq!(result.unwrap(), f.output);
        assert!(session.email_generated);
        assert_eq!(session.campaign_id, None);
        assert!(session.subject_line.is_empty());

        let html = std::fs::read_to_string(&f.output).unwrap();
        assert!(html.contains("Budget Passes"));
        assert!(!html.contains("SPONSORED"));
    }

    #[tokio::test]
    async fn test_generate_halts_without_headlines() {
        let f = files();
        let (session, result) = generate_email(
            generated(),
            Err(NewsletterError::source_unavailable("headline page", "HTTP 500")),
            Vec::new(),
            &f.template,
            &f.output,
        )
        .await;
        assert!(matches!(result, Err(NewsletterError::SourceUnavailable { .. })));
        assert!(!session.email_generated);
        assert!(!f.output.exists());

        let (session, result) = generate_email(
            Session::default(),
            Ok(SectionMap::new()),
            Vec::new(),
            &f.template,
            &f.output,
        )
        .await;
        assert!(result.is_err());
        assert!(!session.email_generated);
    }

    #[tokio::test]
    async fn test_generate_reports_template_errors() {
        let f = files();
        let missing = f.template.with_file_name("missing.html");
        let (session, result) = generate_email(
            Session::default(),
            Ok(headlines()),
            Vec::new(),
            &missing,
            &f.output,
        )
        .await;
        assert!(matches!(result, Err(NewsletterError::TemplateIo { .. })));
        assert!(!session.email_generated);
    }

    #[tokio::test]
    async fn test_create_requires_subject_and_generated_email() {
        let f = files();
        let api = FakeApi::default();

        let (session, result) = create_campaign(generated(), &api, "   ", &f.output).await;
        assert!(matches!(result, Err(NewsletterError::MissingSubjectLine)));
        assert_eq!(session, generated());

        let (_, result) = create_campaign(Session::default(), &api, "Hello", &f.output).await;
        assert!(matches!(result, Err(NewsletterError::EmailNotGenerated)));

        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_missing_email_file() {
        let f = files();
        let api = FakeApi::default();
        let (session, result) = create_campaign(generated(), &api, "Hello", &f.output).await;
        assert!(matches!(result, Err(NewsletterError::TemplateIo { .. })));
        assert_eq!(session.campaign_id, None);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_full_flow_creates_and_sends() {
        let f = files();
        let api = FakeApi::default();

        let (session, result) = generate_email(
            Session::default(),
            Ok(headlines()),
            Vec::new(),
            &f.template,
            &f.output,
        )
        .await;
        result.unwrap();

        let (session, result) = create_campaign(session, &api, " Morning Report ", &f.output).await;
        assert_eq!(result.unwrap(), "cmp-1");
        assert_eq!(session.campaign_id.as_deref(), Some("cmp-1"));
        assert_eq!(session.subject_line, "Morning Report");

        let (session, result) = send_campaign(session, &api, false).await;
        assert!(matches!(result, Err(NewsletterError::SendNotConfirmed)));

        let (session, result) = send_campaign(session, &api, true).await;
        result.unwrap();
        assert_eq!(session.campaign_id.as_deref(), Some("cmp-1"));

        let calls = api.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], "create:Morning Report");
        assert!(calls[1].starts_with("content:cmp-1:"));
        assert_eq!(calls[2], "send:cmp-1");
    }

    #[tokio::test]
    async fn test_content_failure_does_not_roll_back_or_store_id() {
        let f = files();
        std::fs::write(&f.output, "<html>email</html>").unwrap();
        let api = FakeApi {
            fail_content: true,
            ..FakeApi::default()
        };

        let (session, result) = create_campaign(generated(), &api, "Hello", &f.output).await;
        assert!(matches!(result, Err(NewsletterError::CampaignApi { step: "content upload", .. })));
        assert_eq!(session.campaign_id, None);
        // created once, never deleted
        assert_eq!(api.calls(), vec!["create:Hello".to_string(), "content:cmp-1:18".to_string()]);
    }

    #[tokio::test]
    async fn test_create_failure_skips_content() {
        let f = files();
        std::fs::write(&f.output, "<html>email</html>").unwrap();
        let api = FakeApi {
            fail_create: true,
            ..FakeApi::default()
        };
        let (session, result) = create_campaign(generated(), &api, "Hello", &f.output).await;
        assert!(matches!(result, Err(NewsletterError::CampaignApi { step: "creation", .. })));
        assert_eq!(session.campaign_id, None);
        assert_eq!(api.calls(), vec!["create:Hello".to_string()]);
    }

    #[tokio::test]
    async fn test_send_requires_campaign() {
        let api = FakeApi::default();
        let (_, result) = send_campaign(generated(), &api, true).await;
        assert!(matches!(result, Err(NewsletterError::NoCampaign)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_keeps_session() {
        let api = FakeApi {
            fail_send: true,
            ..FakeApi::default()
        };
        let session = Session {
            email_generated: true,
            campaign_id: Some("cmp-9".to_string()),
            subject_line: "Hi".to_string(),
        };
        let (after, result) = send_campaign(session.clone(), &api, true).await;
        assert!(matches!(result, Err(NewsletterError::CampaignApi { step: "send", .. })));
        assert_eq!(after, session);
    }
}
