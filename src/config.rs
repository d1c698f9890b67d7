//! Runtime configuration.
//!
//! Values come from three layers, highest precedence first:
//!
//! 1. Command-line flags and their environment variables (see [`Cli`])
//! 2. An optional YAML file passed with `--config`
//! 3. Built-in defaults for the newsletter's usual sources and sender
//!
//! ```yaml
//! headlines_url: https://www.ctcapitolreport.com/email_template.php
//! ads_csv_url: https://docs.google.com/spreadsheets/d/<id>/gviz/tq?tqx=out:csv
//! template_path: templates/email_template.html
//! output_path: Updated_Email_Template.html
//! mailchimp:
//!   server_prefix: us20
//!   audience_id: 7f9e915456
//!   from_name: Ct. Capitol Report
//!   reply_to: news@ctcapitolreport.com
//! ```
//!
//! The Mailchimp API key is normally supplied through `MAILCHIMP_API_KEY`
//! rather than the file.

use crate::campaign::MailchimpSettings;
use crate::cli::Cli;
use crate::error::NewsletterError;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

pub const DEFAULT_HEADLINES_URL: &str = "https://www.ctcapitolreport.com/email_template.php";
pub const DEFAULT_ADS_CSV_URL: &str =
    "https://docs.google.com/spreadsheets/d/1CIY8uZJcfrLduMHcjxBqYpFs0ygIJPSdGHZ_RVlR48g/gviz/tq?tqx=out:csv";
pub const DEFAULT_ADS_EDIT_URL: &str =
    "https://docs.google.com/spreadsheets/d/1CIY8uZJcfrLduMHcjxBqYpFs0ygIJPSdGHZ_RVlR48g/edit";
pub const DEFAULT_TEMPLATE_PATH: &str = "templates/email_template.html";
pub const DEFAULT_OUTPUT_PATH: &str = "Updated_Email_Template.html";
pub const DEFAULT_SERVER_PREFIX: &str = "us20";
pub const DEFAULT_FROM_NAME: &str = "Ct. Capitol Report";
pub const DEFAULT_REPLY_TO: &str = "news@ctcapitolreport.com";

/// Shape of the optional YAML file. Every field may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub headlines_url: Option<String>,
    pub ads_csv_url: Option<String>,
    pub ads_edit_url: Option<String>,
    pub template_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub mailchimp: MailchimpFileConfig,
}

#[derive(Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MailchimpFileConfig {
    pub api_key: Option<String>,
    pub server_prefix: Option<String>,
    pub audience_id: Option<String>,
    pub from_name: Option<String>,
    pub reply_to: Option<String>,
}

impl fmt::Debug for MailchimpFileConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailchimpFileConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("server_prefix", &self.server_prefix)
            .field("audience_id", &self.audience_id)
            .field("from_name", &self.from_name)
            .field("reply_to", &self.reply_to)
            .finish()
    }
}

impl FileConfig {
    /// Parse a YAML config file.
    pub fn load(path: &Path) -> Result<Self, NewsletterError> {
        let raw = std::fs::read_to_string(path).map_err(|e| NewsletterError::Config {
            reason: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::parse(&raw).map_err(|e| NewsletterError::Config {
            reason: format!("invalid {}: {e}", path.display()),
        })
    }

    pub fn parse(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }
}

/// Fully resolved settings for one run.
#[derive(Clone)]
pub struct NewsletterConfig {
    pub headlines_url: String,
    pub ads_csv_url: String,
    pub ads_edit_url: String,
    pub template_path: PathBuf,
    pub output_path: PathBuf,
    pub mailchimp_api_key: Option<String>,
    pub mailchimp_server_prefix: String,
    pub mailchimp_audience_id: Option<String>,
    pub from_name: String,
    pub reply_to: String,
}

impl fmt::Debug for NewsletterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewsletterConfig")
            .field("headlines_url", &self.headlines_url)
            .field("ads_csv_url", &self.ads_csv_url)
            .field("ads_edit_url", &self.ads_edit_url)
            .field("template_path", &self.template_path)
            .field("output_path", &self.output_path)
            .field("mailchimp_api_key", &self.mailchimp_api_key.as_ref().map(|_| "<redacted>"))
            .field("mailchimp_server_prefix", &self.mailchimp_server_prefix)
            .field("mailchimp_audience_id", &self.mailchimp_audience_id)
            .field("from_name", &self.from_name)
            .field("reply_to", &self.reply_to)
            .finish()
    }
}

impl NewsletterConfig {
    /// Load the file named by `--config` (if any) and layer the CLI on top.
    #[instrument(level = "info", skip_all)]
    pub fn resolve(cli: &Cli) -> Result<Self, NewsletterError> {
        let file = match &cli.config {
            Some(path) => {
                let file = FileConfig::load(Path::new(path))?;
                info!(config_path = %path, "Loaded configuration file");
                file
            }
            None => FileConfig::default(),
        };
        Ok(Self::merge(cli, file))
    }

    /// Combine CLI values, file values and defaults.
    pub fn merge(cli: &Cli, file: FileConfig) -> Self {
        let mailchimp = file.mailchimp;
        Self {
            headlines_url: cli
                .headlines_url
                .clone()
                .or(file.headlines_url)
                .unwrap_or_else(|| DEFAULT_HEADLINES_URL.to_string()),
            ads_csv_url: cli
                .ads_csv_url
                .clone()
                .or(file.ads_csv_url)
                .unwrap_or_else(|| DEFAULT_ADS_CSV_URL.to_string()),
            ads_edit_url: file
                .ads_edit_url
                .unwrap_or_else(|| DEFAULT_ADS_EDIT_URL.to_string()),
            template_path: cli
                .template
                .clone()
                .or(file.template_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE_PATH)),
            output_path: cli
                .output
                .clone()
                .or(file.output_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH)),
            mailchimp_api_key: cli.mailchimp_api_key.clone().or(mailchimp.api_key),
            mailchimp_server_prefix: cli
                .mailchimp_server
                .clone()
                .or(mailchimp.server_prefix)
                .unwrap_or_else(|| DEFAULT_SERVER_PREFIX.to_string()),
            mailchimp_audience_id: cli.mailchimp_audience.clone().or(mailchimp.audience_id),
            from_name: mailchimp
                .from_name
                .unwrap_or_else(|| DEFAULT_FROM_NAME.to_string()),
            reply_to: mailchimp
                .reply_to
                .unwrap_or_else(|| DEFAULT_REPLY_TO.to_string()),
        }
    }

    /// Mailchimp credentials, or a configuration error naming what is missing.
    pub fn mailchimp_settings(&self) -> Result<MailchimpSettings, NewsletterError> {
        let api_key = self
            .mailchimp_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| NewsletterError::Config {
                reason: "Mailchimp API key missing (set MAILCHIMP_API_KEY)".to_string(),
            })?;
        let audience_id = self
            .mailchimp_audience_id
            .clone()
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| NewsletterError::Config {
                reason: "Mailchimp audience id missing (set MAILCHIMP_AUDIENCE_ID)".to_string(),
            })?;
        Ok(MailchimpSettings {
            api_key,
            server_prefix: self.mailchimp_server_prefix.clone(),
            audience_id,
            from_name: self.from_name.clone(),
            reply_to: self.reply_to.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn bare_cli() -> Cli {
        Cli::parse_from(["newsletter_machine", "generate"])
    }

    #[test]
    fn test_defaults_apply_without_file_or_flags() {
        let mut cli = bare_cli();
        cli.mailchimp_api_key = None;
        cli.mailchimp_audience = None;
        cli.mailchimp_server = None;
        cli.headlines_url = None;
        cli.ads_csv_url = None;
        let config = NewsletterConfig::merge(&cli, FileConfig::default());
        assert_eq!(config.headlines_url, DEFAULT_HEADLINES_URL);
        assert_eq!(config.ads_csv_url, DEFAULT_ADS_CSV_URL);
        assert_eq!(config.template_path, PathBuf::from(DEFAULT_TEMPLATE_PATH));
        assert_eq!(config.output_path, PathBuf::from(DEFAULT_OUTPUT_PATH));
        assert_eq!(config.mailchimp_server_prefix, "us20");
        assert_eq!(config.from_name, "Ct. Capitol Report");
        assert!(config.mailchimp_settings().is_err());
    }

    #[test]
    fn test_file_values_are_overridden_by_cli() {
        let file = FileConfig::parse(
            r#"
headlines_url: https://file.example.com/page
output_path: out/file.html
mailchimp:
  api_key: file-key
  audience_id: file-audience
  from_name: File Sender
"#,
        )
        .unwrap();

        let mut cli = bare_cli();
        cli.headlines_url = Some("https://cli.example.com/page".to_string());
        cli.mailchimp_api_key = None;
        cli.mailchimp_audience = None;
        cli.mailchimp_server = Some("us5".to_string());

        let config = NewsletterConfig::merge(&cli, file);
        assert_eq!(config.headlines_url, "https://cli.example.com/page");
        assert_eq!(config.output_path, PathBuf::from("out/file.html"));

        let settings = config.mailchimp_settings().unwrap();
        assert_eq!(settings.api_key, "file-key");
        assert_eq!(settings.audience_id, "file-audience");
        assert_eq!(settings.server_prefix, "us5");
        assert_eq!(settings.from_name, "File Sender");
        assert_eq!(settings.reply_to, DEFAULT_REPLY_TO);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(FileConfig::parse("headline_url: typo\n").is_err());
        assert!(FileConfig::parse("").is_ok());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = FileConfig::load(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, NewsletterError::Config { .. }));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let mut cli = bare_cli();
        cli.mailchimp_api_key = Some("super-secret".to_string());
        let config = NewsletterConfig::merge(&cli, FileConfig::default());
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
