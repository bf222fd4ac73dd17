//! Travel article collector.
//!
//! Downloads plain-text extracts of the configured Wikipedia and Wikivoyage
//! pages through the MediaWiki query API and writes one file per article into
//! the data directory:
//!
//! ```text
//! Source: Wikivoyage
//! Title: Paris
//! URL: https://en.wikivoyage.org/wiki/Paris
//! Fetched: 2024-05-01T10:00:00+00:00
//! Content:
//! Paris, the cosmopolitan capital of France, ...
//! ```
//!
//! Requests are sequential with a fixed delay between them. A page that is
//! missing or fails to download is reported and skipped; nothing is retried.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::Config;
use crate::progress::{ProgressEvent, ProgressReporter};

/// One page as returned by the MediaWiki API.
#[derive(Debug, Clone)]
pub struct FetchedArticle {
    pub site: String,
    pub title: String,
    pub url: Option<String>,
    pub fetched_at: DateTime<Utc>,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    query: Option<QueryBody>,
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    #[serde(default)]
    pages: HashMap<String, Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    fullurl: Option<String>,
    #[serde(default)]
    missing: Option<serde_json::Value>,
}

/// Build the HTTP client used for every collector request.
pub fn build_client(config: &Config) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(config.collector.user_agent.clone())
        .timeout(Duration::from_secs(config.collector.timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

/// Fetch the plain-text extract of `title` from a MediaWiki `api.php`
/// endpoint. Returns `Ok(None)` when the page does not exist or is empty.
pub async fn fetch_article(
    client: &reqwest::Client,
    site: &str,
    api_url: &str,
    title: &str,
) -> Result<Option<FetchedArticle>> {
    let resp = client
        .get(api_url)
        .query(&[
            ("action", "query"),
            ("prop", "extracts|info"),
            ("inprop", "url"),
            ("explaintext", "1"),
            ("redirects", "1"),
            ("format", "json"),
            ("titles", title),
        ])
        .send()
        .await
        .with_context(|| format!("Request to {} failed", api_url))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        bail!("{} returned {}: {}", api_url, status, body);
    }

    let body = resp
        .text()
        .await
        .with_context(|| format!("Failed to read response from {}", api_url))?;
    parse_query_response(site, title, &body, Utc::now())
}

fn parse_query_response(
    site: &str,
    requested_title: &str,
    body: &str,
    fetched_at: DateTime<Utc>,
) -> Result<Option<FetchedArticle>> {
    let parsed: QueryResponse =
        serde_json::from_str(body).context("Failed to parse MediaWiki response")?;

    let Some(query) = parsed.query else {
        return Ok(None);
    };

    for (page_id, page) in query.pages {
        if page_id == "-1" || page.missing.is_some() {
            continue;
        }
        let content = page.extract.unwrap_or_default();
        if content.trim().is_empty() {
            continue;
        }
        return Ok(Some(FetchedArticle {
            site: site.to_string(),
            title: page.title.unwrap_or_else(|| requested_title.to_string()),
            url: page.fullurl,
            fetched_at,
            content,
        }));
    }

    Ok(None)
}

/// `<Site>_<Title>.txt` with spaces and path separators replaced by `_`.
pub fn article_file_name(site: &str, title: &str) -> String {
    let safe: String = title
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect();
    format!("{}_{}.txt", site, safe)
}

/// The on-disk representation of a fetched article.
pub fn render_article_file(article: &FetchedArticle) -> String {
    let mut out = String::with_capacity(article.content.len() + 256);
    out.push_str(&format!("Source: {}\n", article.site));
    out.push_str(&format!("Title: {}\n", article.title));
    if let Some(url) = &article.url {
        out.push_str(&format!("URL: {}\n", url));
    }
    out.push_str(&format!("Fetched: {}\n", article.fetched_at.to_rfc3339()));
    out.push_str("Content:\n");
    out.push_str(&article.content);
    out.push('\n');
    out
}

/// Download every configured article into the data directory.
pub async fn run_collect(config: &Config, progress: &dyn ProgressReporter) -> Result<()> {
    let data_dir = &config.data.dir;
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

    let client = build_client(config)?;
    let c = &config.collector;

    let jobs: Vec<(&str, &str, &str)> = c
        .wikipedia
        .iter()
        .map(|t| ("Wikipedia", c.wikipedia_api.as_str(), t.as_str()))
        .chain(
            c.wikivoyage
                .iter()
                .map(|t| ("Wikivoyage", c.wikivoyage_api.as_str(), t.as_str())),
        )
        .collect();

    let total = jobs.len() as u64;
    let mut downloaded = 0usize;
    let mut missing = 0usize;
    let mut failed = 0usize;

    for (i, (site, api_url, title)) in jobs.iter().enumerate() {
        if i > 0 && c.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(c.delay_ms)).await;
        }
        progress.report(ProgressEvent::Fetching {
            site: site.to_string(),
            title: title.to_string(),
            n: i as u64 + 1,
            total,
        });

        match fetch_article(&client, site, api_url, title).await {
            Ok(Some(article)) => {
                let path = data_dir.join(article_file_name(site, title));
                std::fs::write(&path, render_article_file(&article))
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                tracing::debug!("saved {} ({} chars)", path.display(), article.content.len());
                downloaded += 1;
            }
            Ok(None) => {
                tracing::warn!("{}: '{}' not found", site, title);
                missing += 1;
            }
            Err(e) => {
                tracing::warn!("{}: failed to fetch '{}': {:#}", site, title, e);
                failed += 1;
            }
        }
    }

    println!("Collection complete:");
    println!("  downloaded: {}", downloaded);
    println!("  missing:    {}", missing);
    println!("  failed:     {}", failed);
    println!("  data dir:   {}", data_dir.display());

    if downloaded == 0 && total > 0 {
        bail!("No articles were downloaded. Check your network connection and [collector] settings.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::parse_article;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_existing_page() {
        let body = r#"{
            "batchcomplete": "",
            "query": {
                "pages": {
                    "24433": {
                        "pageid": 24433,
                        "title": "Paris",
                        "extract": "Paris is the capital of France.",
                        "fullurl": "https://en.wikivoyage.org/wiki/Paris"
                    }
                }
            }
        }"#;
        let a = parse_query_response("Wikivoyage", "Paris", body, ts())
            .unwrap()
            .unwrap();
        assert_eq!(a.title, "Paris");
        assert_eq!(a.url.as_deref(), Some("https://en.wikivoyage.org/wiki/Paris"));
        assert_eq!(a.content, "Paris is the capital of France.");
    }

    #[test]
    fn test_parse_missing_page() {
        let body = r#"{"query":{"pages":{"-1":{"ns":0,"title":"Nowhere","missing":""}}}}"#;
        assert!(parse_query_response("Wikipedia", "Nowhere", body, ts())
            .unwrap()
            .is_none());
        assert!(parse_query_response("Wikipedia", "x", "{}", ts())
            .unwrap()
            .is_none());
        assert!(parse_query_response("Wikipedia", "x", "not json", ts()).is_err());
    }

    #[test]
    fn test_article_file_name() {
        assert_eq!(
            article_file_name("Wikivoyage", "Budget travel"),
            "Wikivoyage_Budget_travel.txt"
        );
        assert_eq!(article_file_name("Wikipedia", "AC/DC"), "Wikipedia_AC_DC.txt");
    }

    #[test]
    fn test_rendered_file_reads_back() {
        let article = FetchedArticle {
            site: "Wikivoyage".to_string(),
            title: "Tokyo".to_string(),
            url: Some("https://en.wikivoyage.org/wiki/Tokyo".to_string()),
            fetched_at: ts(),
            content: "Tokyo is huge.\n\n== See ==\nTemples.".to_string(),
        };
        let raw = render_article_file(&article);
        assert!(raw.starts_with("Source: Wikivoyage\nTitle: Tokyo\n"));

        let parsed = parse_article("Wikivoyage_Tokyo.txt", &raw);
        assert_eq!(parsed.title, "Tokyo");
        assert_eq!(parsed.site, "Wikivoyage");
        assert_eq!(parsed.source_url, article.url);
        assert_eq!(parsed.fetched_at, Some(ts()));
        assert_eq!(parsed.body, "Tokyo is huge. == See == Temples.");
    }
}
