//! Command-line interface definitions for the newsletter machine.
//!
//! Every source and credential can be given as a flag, an environment
//! variable, or a key in the YAML file passed with `--config`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Walk through the four steps interactively
/// newsletter_machine
///
/// # Only build the email file
/// newsletter_machine -t templates/email_template.html -o out.html generate
///
/// # Build, upload and send in one go
/// MAILCHIMP_API_KEY=... MAILCHIMP_AUDIENCE_ID=... \
///     newsletter_machine campaign --subject "Morning Report" --send --yes
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Page the headlines are scraped from
    #[arg(long, env = "HEADLINES_URL")]
    pub headlines_url: Option<String>,

    /// CSV export URL of the ad spreadsheet
    #[arg(long, env = "ADS_CSV_URL")]
    pub ads_csv_url: Option<String>,

    /// Email template containing the section and date tokens
    #[arg(short, long)]
    pub template: Option<PathBuf>,

    /// Where the generated email is written
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Mailchimp API key
    #[arg(long, env = "MAILCHIMP_API_KEY", hide_env_values = true)]
    pub mailchimp_api_key: Option<String>,

    /// Mailchimp data-center prefix (e.g. us20)
    #[arg(long, env = "MAILCHIMP_SERVER_PREFIX")]
    pub mailchimp_server: Option<String>,

    /// Mailchimp audience (list) id the campaign targets
    #[arg(long, env = "MAILCHIMP_AUDIENCE_ID")]
    pub mailchimp_audience: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Step 1: load the ad sheet and list its rows
    Ads,
    /// Step 2: scrape headlines, place ads and write the email file
    Generate,
    /// Steps 2-4: generate the email, create a campaign with it, optionally send
    Campaign {
        /// Subject line of the campaign
        #[arg(short, long)]
        subject: String,

        /// Send the campaign right after creating it
        #[arg(long)]
        send: bool,

        /// Confirm sending without a prompt
        #[arg(long, requires = "send")]
        yes: bool,
    },
    /// Prompt for each step in turn (default)
    Interactive,
}
