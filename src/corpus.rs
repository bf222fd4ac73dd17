//! Article corpus loader.
//!
//! Walks the data directory written by the collector, parses each file's
//! `Key: value` header, and normalizes the body text for chunking.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::DataConfig;
use crate::models::Article;

/// Marker line separating the header from the article text.
pub const CONTENT_MARKER: &str = "Content:";

/// Header lines inspected when a file has no `Content:` marker.
const HEADER_SCAN_LINES: usize = 5;

pub fn load_articles(data: &DataConfig) -> Result<Vec<Article>> {
    let root = &data.dir;
    if !root.exists() {
        bail!(
            "Data directory '{}' not found. Run `travelrag collect` first to download the travel articles.",
            root.display()
        );
    }

    let include_set = build_globset(&data.include_globs)?;
    let mut articles = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if !include_set.is_match(&rel_str) {
            continue;
        }

        match read_article(path, &rel_str) {
            Ok(article) => articles.push(article),
            Err(e) => tracing::warn!("skipping {}: {:#}", rel_str, e),
        }
    }

    articles.sort_by(|a, b| a.source_file.cmp(&b.source_file));
    tracing::debug!("loaded {} articles from {}", articles.len(), root.display());

    Ok(articles)
}

fn read_article(path: &Path, relative_path: &str) -> Result<Article> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read article file: {}", path.display()))?;
    Ok(parse_article(relative_path, &raw))
}

/// Parse one article file. Missing header fields fall back to the file stem
/// (title) and `"Unknown"` (site).
pub fn parse_article(source_file: &str, raw: &str) -> Article {
    let (header, body) = match raw.find(CONTENT_MARKER) {
        Some(pos) => (&raw[..pos], &raw[pos + CONTENT_MARKER.len()..]),
        None => {
            let header_end = raw
                .match_indices('\n')
                .nth(HEADER_SCAN_LINES - 1)
                .map(|(i, _)| i)
                .unwrap_or(raw.len());
            (&raw[..header_end], raw)
        }
    };

    let mut title = None;
    let mut site = None;
    let mut source_url = None;
    let mut fetched_at = None;

    for line in header.lines() {
        if let Some(v) = line.strip_prefix("Title: ") {
            title = Some(v.trim().to_string());
        } else if let Some(v) = line.strip_prefix("Source: ") {
            site = Some(v.trim().to_string());
        } else if let Some(v) = line.strip_prefix("URL: ") {
            source_url = Some(v.trim().to_string());
        } else if let Some(v) = line.strip_prefix("Fetched: ") {
            fetched_at = DateTime::parse_from_rfc3339(v.trim())
                .ok()
                .map(|d| d.with_timezone(&Utc));
        }
    }

    let title = title.filter(|t| !t.is_empty()).unwrap_or_else(|| {
        Path::new(source_file)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| source_file.to_string())
    });

    Article {
        title,
        site: site.unwrap_or_else(|| "Unknown".to_string()),
        source_url,
        fetched_at,
        source_file: source_file.to_string(),
        body: clean_text(body),
    }
}

/// Collapse every whitespace run into a single space and trim.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  a\n\n b\t\tc  "), "a b c");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn test_parse_article_with_header() {
        let raw = "Source: Wikivoyage\nTitle: Paris\nURL: https://en.wikivoyage.org/wiki/Paris\nFetched: 2024-05-01T10:00:00Z\nContent:\nParis is\n\nthe capital.";
        let a = parse_article("Wikivoyage_Paris.txt", raw);
        assert_eq!(a.title, "Paris");
        assert_eq!(a.site, "Wikivoyage");
        assert_eq!(
            a.source_url.as_deref(),
            Some("https://en.wikivoyage.org/wiki/Paris")
        );
        assert!(a.fetched_at.is_some());
        assert_eq!(a.body, "Paris is the capital.");
    }

    #[test]
    fn test_parse_article_without_header() {
        let a = parse_article("notes/Rome.txt", "Rome has many fountains.\n");
        assert_eq!(a.title, "Rome");
        assert_eq!(a.site, "Unknown");
        assert!(a.source_url.is_none());
        assert_eq!(a.body, "Rome has many fountains.");
    }

    #[test]
    fn test_missing_directory_mentions_collect() {
        let data = DataConfig {
            dir: PathBuf::from("/definitely/not/here"),
            include_globs: vec!["**/*.txt".to_string()],
        };
        let err = load_articles(&data).unwrap_err();
        assert!(err.to_string().contains("travelrag collect"));
    }

    #[test]
    fn test_load_articles_filters_and_sorts() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("b.txt"),
            "Source: Wikipedia\nTitle: Beta\nContent:\nSecond.",
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("a.txt"),
            "Source: Wikipedia\nTitle: Alpha\nContent:\nFirst.",
        )
        .unwrap();
        std::fs::write(tmp.path().join("ignored.md"), "# nope").unwrap();

        let data = DataConfig {
            dir: tmp.path().to_path_buf(),
            include_globs: vec!["**/*.txt".to_string()],
        };
        let articles = load_articles(&data).unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "Alpha");
        assert_eq!(articles[1].title, "Beta");
    }
}
