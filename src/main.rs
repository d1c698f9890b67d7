//! # Newsletter Machine
//!
//! Builds the daily newsletter email and ships it through Mailchimp.
//!
//! ## Features
//!
//! - Scrapes section headlines from the newsletter's headline page
//! - Reads sponsor ads from a shared spreadsheet's CSV export
//! - Shuffles the ads into the sections and fills the email template
//! - Creates, fills and sends a Mailchimp campaign from the result
//!
//! ## Usage
//!
//! ```sh
//! newsletter_machine                       # interactive, step by step
//! newsletter_machine generate              # write the email file only
//! newsletter_machine campaign -s "Subject" # generate and create a campaign
//! ```
//!
//! ## Architecture
//!
//! The operator works through four steps:
//! 1. **Ads**: load and review the ad sheet
//! 2. **Generate**: scrape headlines, place ads, write the email
//! 3. **Campaign**: create a Mailchimp campaign with the email as content
//! 4. **Send**: confirm and send the campaign
//!
//! A [`Session`] value carries what earlier steps produced into later ones.

use chrono::Local;
use clap::Parser;
use reqwest::Client;
use std::error::Error;
use std::io::Write as _;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod ads;
mod campaign;
mod cli;
mod config;
mod error;
mod models;
mod scrapers;
mod session;
mod template;
mod utils;

use ads::{fetch_ad_entries, fetch_ads, AD_COLUMNS};
use campaign::MailchimpClient;
use cli::{Cli, Command};
use config::NewsletterConfig;
use error::NewsletterError;
use session::Session;
use template::newsletter_date;
use utils::ensure_output_dir;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared handles for every step of a run.
struct App {
    http: Client,
    config: NewsletterConfig,
}

impl App {
    fn mailchimp(&self) -> Result<MailchimpClient, NewsletterError> {
        Ok(MailchimpClient::new(
            self.http.clone(),
            self.config.mailchimp_settings()?,
        ))
    }

    /// Step 1: fetch the ad sheet and print it as a table.
    #[instrument(level = "info", skip_all)]
    async fn load_ads(&self) -> usize {
        let ads = fetch_ad_entries(&self.http, &self.config.ads_csv_url).await;
        if ads.is_empty() {
            println!("No ads loaded. Check the sheet: {}", self.config.ads_edit_url);
            return 0;
        }

        println!("Ads loaded successfully!");
        println!("{:<70} | {}", AD_COLUMNS[0], AD_COLUMNS[1]);
        println!("{}", "-".repeat(100));
        for ad in &ads {
            println!("{:<70} | {}", ad.text, ad.url);
        }
        println!("Edit ads: {}", self.config.ads_edit_url);
        ads.len()
    }

    /// Step 2: scrape, fetch ads, and write the email.
    #[instrument(level = "info", skip_all)]
    async fn generate(&self, session: Session) -> (Session, Result<(), NewsletterError>) {
        println!("Scraping headlines and fetching ads...");
        let headlines =
            scrapers::headlines::scrape_headlines(&self.http, &self.config.headlines_url).await;
        let raw_ads = fetch_ads(&self.http, &self.config.ads_csv_url).await;
        if raw_ads.is_empty() {
            println!("No ads found, proceeding without ads.");
        }

        let (session, result) = session::generate_email(
            session,
            headlines,
            raw_ads,
            &self.config.template_path,
            &self.config.output_path,
        )
        .await;

        match result {
            Ok(path) => {
                println!(
                    "Email template generated for {}: {}",
                    newsletter_date(Local::now().date_naive()),
                    path.display()
                );
                (session, Ok(()))
            }
            Err(e) => {
                report("Generating the email", &e);
                (session, Err(e))
            }
        }
    }

    /// Step 3: create the campaign from the generated email.
    #[instrument(level = "info", skip(self, session))]
    async fn create(
        &self,
        session: Session,
        subject_line: &str,
    ) -> (Session, Result<(), NewsletterError>) {
        let api = match self.mailchimp() {
            Ok(api) => api,
            Err(e) => {
                report("Creating the campaign", &e);
                return (session, Err(e));
            }
        };

        let (session, result) =
            session::create_campaign(session, &api, subject_line, &self.config.output_path).await;
        match result {
            Ok(id) => {
                println!("Campaign '{}' created successfully! ID: {id}", session.subject_line);
                (session, Ok(()))
            }
            Err(e) => {
                report("Creating the campaign", &e);
                (session, Err(e))
            }
        }
    }

    /// Step 4: send the session's campaign.
    #[instrument(level = "info", skip(self, session))]
    async fn send(
        &self,
        session: Session,
        confirmed: bool,
    ) -> (Session, Result<(), NewsletterError>) {
        let api = match self.mailchimp() {
            Ok(api) => api,
            Err(e) => {
                report("Sending the campaign", &e);
                return (session, Err(e));
            }
        };

        let (session, result) = session::send_campaign(session, &api, confirmed).await;
        match result {
            Ok(()) => {
                println!("Campaign sent successfully!");
                (session, Ok(()))
            }
            Err(e) => {
                report("Sending the campaign", &e);
                (session, Err(e))
            }
        }
    }
}

/// Log a failed step and tell the operator which one it was.
fn report(step: &str, e: &NewsletterError) {
    error!(step, error = %e, "Step failed");
    println!("{step} failed: {e}");
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let start_time = std::time::Instant::now();
    info!("newsletter_machine starting up");

    let args = Cli::parse();
    debug!(?args.command, ?args.config, "Parsed CLI arguments");

    let config = match NewsletterConfig::resolve(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };
    debug!(?config, "Resolved configuration");

    // Early check: the email must be writable before anything is scraped
    if let Err(e) = ensure_output_dir(&config.output_path).await {
        error!(
            path = %config.output_path.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let http = Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(concat!("newsletter_machine/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let app = App { http, config };

    let command = args.command.unwrap_or(Command::Interactive);
    let outcome: Result<(), Box<dyn Error>> = match command {
        Command::Ads => {
            app.load_ads().await;
            Ok(())
        }
        Command::Generate => app.generate(Session::default()).await.1.map_err(Into::into),
        Command::Campaign { subject, send, yes } => {
            run_campaign(&app, &subject, send, yes).await.map_err(Into::into)
        }
        Command::Interactive => interactive(&app).await.map_err(|e| {
            error!(error = %e, "Reading operator input failed");
            e.into()
        }),
    };

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    outcome
}

/// Steps 2-4 without prompts.
async fn run_campaign(
    app: &App,
    subject: &str,
    send: bool,
    yes: bool,
) -> Result<(), NewsletterError> {
    let (session, result) = app.generate(Session::default()).await;
    result?;

    let (session, result) = app.create(session, subject).await;
    result?;

    if !send {
        info!(campaign_id = ?session.campaign_id, "Campaign created; not sending");
        return Ok(());
    }
    let (_, result) = app.send(session, yes).await;
    result
}

/// Prompt loop over the four steps. Returns when the operator quits or stdin closes.
async fn interactive(app: &App) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut session = Session::default();

    loop {
        println!();
        println!("Step 1: Load ads        [1]");
        println!("Step 2: Generate email  [2]");
        println!("Step 3: Create campaign [3]");
        if let Some(id) = &session.campaign_id {
            println!("Step 4: Send campaign   [4]  ({id}: {})", session.subject_line);
        }
        println!("Quit                    [q]");

        let Some(choice) = prompt(&mut lines, "> ").await? else {
            break;
        };

        session = match choice.as_str() {
            "1" => {
                app.load_ads().await;
                session
            }
            "2" => app.generate(session).await.0,
            "3" => {
                let Some(subject) = prompt(&mut lines, "Email subject line: ").await? else {
                    break;
                };
                app.create(session, &subject).await.0
            }
            "4" => {
                if session.campaign_id.is_none() {
                    println!("Create a campaign first.");
                    continue;
                }
                println!("Campaign subject line: {}", session.subject_line);
                let Some(answer) =
                    prompt(&mut lines, "Type 'yes' to confirm sending this campaign now: ").await?
                else {
                    break;
                };
                app.send(session, answer.eq_ignore_ascii_case("yes")).await.0
            }
            "q" | "quit" | "exit" => break,
            "" => session,
            other => {
                warn!(choice = other, "Unknown menu choice");
                println!("Unknown choice '{other}'.");
                session
            }
        };
    }

    info!(?session, "Interactive session finished");
    Ok(())
}

async fn prompt<R>(lines: &mut tokio::io::Lines<R>, label: &str) -> std::io::Result<Option<String>>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    print!("{label}");
    std::io::stdout().flush()?;
    Ok(lines.next_line().await?.map(|line| line.trim().to_string()))
}
