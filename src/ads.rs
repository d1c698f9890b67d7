//! Sponsor ads: reading the ad spreadsheet and formatting sponsored messages.
//!
//! The ads live in a shared spreadsheet with two columns, the message text and
//! the destination link. The sheet is read through its public CSV export.
//!
//! Reading produces raw fragments of the form
//! `{text} <a href="{url}" target="_blank">(link)</a>`; [`format_ad`] turns
//! each into the final sponsored-message markup. The two stages agree on that
//! shape, so a fragment that does not match it is reported as
//! [`NewsletterError::MalformedAdFragment`].

use crate::error::NewsletterError;
use crate::models::AdEntry;
use reqwest::Client;
use tracing::{error, info, instrument, warn};
use url::Url;

/// Bold label placed in front of every sponsored message.
pub const SPONSOR_LABEL: &str = "IMPORTANT SPONSORED MESSAGE:";

/// Boilerplate some sheet rows already carry; removed before formatting.
const SPONSOR_PREFIX: &str = "IMPORTANT SPONSORED MESSAGE: ";

const LINK_OPEN: &str = "<a href=\"";
const LINK_CLOSE: &str = "\" target=\"_blank\">";

/// Column names assigned positionally, whatever the sheet's header says.
pub const AD_COLUMNS: [&str; 2] = ["Ad Text", "Ad Link"];

/// Fetch the ad sheet and return its rows.
///
/// Failures are logged and yield an empty list; "no ads" is not fatal to a
/// newsletter.
#[instrument(level = "info", skip(client))]
pub async fn fetch_ad_entries(client: &Client, csv_url: &str) -> Vec<AdEntry> {
    match load_ads(client, csv_url).await {
        Ok(ads) => {
            info!(count = ads.len(), "Loaded ads from sheet");
            ads
        }
        Err(e) => {
            error!(error = %e, "Error fetching ad sheet");
            Vec::new()
        }
    }
}

/// Fetch the ad sheet and return the raw fragments handed to [`format_ads`].
pub async fn fetch_ads(client: &Client, csv_url: &str) -> Vec<String> {
    fetch_ad_entries(client, csv_url)
        .await
        .iter()
        .map(AdEntry::render)
        .collect()
}

async fn load_ads(client: &Client, csv_url: &str) -> Result<Vec<AdEntry>, NewsletterError> {
    let response = client
        .get(csv_url)
        .send()
        .await
        .map_err(|e| NewsletterError::source_unavailable("ad sheet", e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(NewsletterError::source_unavailable(
            "ad sheet",
            format!("HTTP {status}"),
        ));
    }

    let body = response
        .text()
        .await
        .map_err(|e| NewsletterError::source_unavailable("ad sheet", e))?;
    parse_ads_csv(&body)
}

/// Parse a two-column CSV export. The first row is a header and is skipped.
pub fn parse_ads_csv(body: &str) -> Result<Vec<AdEntry>, NewsletterError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| NewsletterError::source_unavailable("ad sheet", e))?;
    if headers.len() != AD_COLUMNS.len() {
        return Err(NewsletterError::source_unavailable(
            "ad sheet",
            format!(
                "expected {} columns ({}), found {}",
                AD_COLUMNS.len(),
                AD_COLUMNS.join(", "),
                headers.len()
            ),
        ));
    }

    let mut ads = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| NewsletterError::source_unavailable("ad sheet", e))?;
        ads.push(AdEntry {
            text: record.get(0).unwrap_or_default().to_string(),
            url: record.get(1).unwrap_or_default().to_string(),
        });
    }
    Ok(ads)
}

/// Format every raw ad fragment. Stops at the first malformed fragment.
pub fn format_ads(raw_ads: &[String]) -> Result<Vec<String>, NewsletterError> {
    raw_ads.iter().map(|raw| format_ad(raw)).collect()
}

/// Turn `{text} <a href="{url}" target="_blank">(link)</a>` into
/// `<br><br><strong>IMPORTANT SPONSORED MESSAGE:</strong> {text}` followed by
/// `<a href="{url}" target="_blank">{host}</a>`.
pub fn format_ad(raw: &str) -> Result<String, NewsletterError> {
    let (text, rest) = raw
        .split_once(LINK_OPEN)
        .ok_or_else(|| NewsletterError::MalformedAdFragment(raw.to_string()))?;
    let (url, _) = rest
        .split_once(LINK_CLOSE)
        .ok_or_else(|| NewsletterError::MalformedAdFragment(raw.to_string()))?;

    let text = text.replace(SPONSOR_PREFIX, "");
    let host = link_host(url);
    if host.is_empty() {
        warn!(%url, "Ad link has no host; label will be empty");
    }

    Ok(format!(
        "<br><br><strong>{SPONSOR_LABEL}</strong> {} \
         <a href=\"{url}\" target=\"_blank\">{host}</a>",
        text.trim()
    ))
}

/// Network location of a URL: host, plus the port when one is spelled out.
fn link_host(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return String::new();
    };
    match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_server::{closed_addr, serve_once};

    #[test]
    fn test_parse_ads_csv_skips_header_and_maps_positionally() {
        let body = "\"Message\",\"Where\"\n\
                    \"Visit the fair, this weekend\",\"https://fair.example.org/tickets\"\n\
                    \"Vote yes\",\"https://vote.example.com\"\n";
        let ads = parse_ads_csv(body).unwrap();
        assert_eq!(
            ads,
            vec![
                AdEntry {
                    text: "Visit the fair, this weekend".to_string(),
                    url: "https://fair.example.org/tickets".to_string(),
                },
                AdEntry {
                    text: "Vote yes".to_string(),
                    url: "https://vote.example.com".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_ads_csv_header_only_is_empty() {
        let ads = parse_ads_csv("Ad Text,Ad Link\n").unwrap();
        assert!(ads.is_empty());
    }

    #[test]
    fn test_parse_ads_csv_rejects_wrong_column_count() {
        assert!(parse_ads_csv("a,b,c\n1,2,3\n").is_err());
        assert!(parse_ads_csv("").is_err());
        // A data row with a third cell is a parse failure too.
        assert!(parse_ads_csv("a,b\n1,2,3\n").is_err());
    }

    #[test]
    fn test_format_ad_strips_prefix_and_labels_with_host() {
        let raw = AdEntry {
            text: "IMPORTANT SPONSORED MESSAGE: Support local news".to_string(),
            url: "https://www.example.com/donate?src=email".to_string(),
        }
        .render();
        let formatted = format_ad(&raw).unwrap();
        assert_eq!(
            formatted,
            "<br><br><strong>IMPORTANT SPONSORED MESSAGE:</strong> Support local news \
             <a href=\"https://www.example.com/donate?src=email\" \
             target=\"_blank\">www.example.com</a>"
        );
    }

    #[test]
    fn test_format_ad_label_is_host_not_full_url() {
        let urls = [
            ("https://a.example.com/path/page", "a.example.com"),
            ("http://example.org", "example.org"),
            ("http://localhost:8080/x", "localhost:8080"),
        ];
        for (url, host) in urls {
            let raw = AdEntry {
                text: "Ad".to_string(),
                url: url.to_string(),
            }
            .render();
            let formatted = format_ad(&raw).unwrap();
            assert!(formatted.ends_with(&format!(">{host}</a>")), "{formatted}");
        }
    }

    #[test]
    fn test_format_ad_rejects_malformed_fragment() {
        let err = format_ad("just some text").unwrap_err();
        assert!(matches!(err, NewsletterError::MalformedAdFragment(_)));

        let err = format_ad("text <a href=\"https://x.com\">(link)</a>").unwrap_err();
        assert!(matches!(err, NewsletterError::MalformedAdFragment(_)));
    }

    #[test]
    fn test_format_ads_keeps_order() {
        let raw: Vec<String> = ["one", "two"]
            .iter()
            .map(|t| {
                AdEntry {
                    text: t.to_string(),
                    url: format!("https://{t}.example.com"),
                }
                .render()
            })
            .collect();
        let formatted = format_ads(&raw).unwrap();
        assert!(formatted[0].contains(" one <a"));
        assert!(formatted[1].contains(" two <a"));
    }

    #[tokio::test]
    async fn test_fetch_ad_entries_reads_served_sheet() {
        let csv = "\"Ad Text\",\"Ad Link\"\n\"Eat at Joe's\",\"https://joes.example.com\"\n";
        let addr = serve_once("200 OK", "text/csv", csv).await;

        let ads = fetch_ad_entries(&Client::new(), &format!("http://{addr}/export")).await;
        assert_eq!(
            ads,
            vec![AdEntry {
                text: "Eat at Joe's".to_string(),
                url: "https://joes.example.com".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_fetch_ad_entries_server_error_yields_no_ads() {
        let csv = "\"Ad Text\",\"Ad Link\"\n\"Eat at Joe's\",\"https://joes.example.com\"\n";
        let addr = serve_once("500 Internal Server Error", "text/csv", csv).await;

        let ads = fetch_ad_entries(&Client::new(), &format!("http://{addr}/export")).await;
        assert!(ads.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_ads_refused_connection_yields_no_ads() {
        let addr = closed_addr().await;
        let url = format!("http://{addr}/export");
        assert!(fetch_ad_entries(&Client::new(), &url).await.is_empty());
        assert!(fetch_ads(&Client::new(), &url).await.is_empty());
    }
}
