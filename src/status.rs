//! Setup checks for `travelrag status`.
//!
//! Mirrors the order in which a first run fails: configuration, collected
//! articles, embedding backend, API key, then the index cache.

use anyhow::Result;
use std::path::Path;

use crate::chunk::chunk_article;
use crate::config::Config;
use crate::corpus;
use crate::embedding;
use crate::index::{corpus_fingerprint, Metric, VectorIndex};

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    pub name: &'static str,
    pub ok: bool,
    pub status: String,
    pub detail: String,
}

impl Check {
    fn new(name: &'static str, ok: bool, status: &str, detail: impl Into<String>) -> Self {
        Self {
            name,
            ok,
            status: status.to_string(),
            detail: detail.into(),
        }
    }
}

/// Run every check. `config_found` is false when defaults are in use.
pub fn collect_checks(config: &Config, config_path: &Path, config_found: bool) -> Vec<Check> {
    let mut checks = Vec::new();

    checks.push(if config_found {
        Check::new("config", true, "OK", config_path.display().to_string())
    } else {
        Check::new(
            "config",
            false,
            "MISSING",
            format!("{} (using defaults)", config_path.display()),
        )
    });

    let articles = corpus::load_articles(&config.data);
    checks.push(match &articles {
        Ok(a) if !a.is_empty() => Check::new(
            "data",
            true,
            "OK",
            format!("{} articles in {}", a.len(), config.data.dir.display()),
        ),
        Ok(_) => Check::new(
            "data",
            false,
            "EMPTY",
            format!("{} (run `travelrag collect`)", config.data.dir.display()),
        ),
        Err(_) => Check::new(
            "data",
            false,
            "MISSING",
            format!("{} (run `travelrag collect`)", config.data.dir.display()),
        ),
    });

    let described = embedding::describe_provider(&config.embedding);
    checks.push(match &described {
        Ok(_) if config.embedding.provider == "local" && !cfg!(feature = "local-embeddings") => {
            Check::new(
                "embedding",
                false,
                "UNAVAILABLE",
                "local provider needs the `local-embeddings` feature",
            )
        }
        Ok((model, dims)) => Check::new(
            "embedding",
            true,
            "OK",
            format!("{} / {} ({} dims)", config.embedding.provider, model, dims),
        ),
        Err(e) => Check::new("embedding", false, "INVALID", e.to_string()),
    });

    checks.push(match config.llm.effective_api_key() {
        Some(_) => Check::new("api key", true, "OK", config.llm.model.clone()),
        None => Check::new(
            "api key",
            false,
            "MISSING",
            "set [llm].api_key or export OPENAI_API_KEY",
        ),
    });

    checks.push(match &config.index.cache_path {
        None => Check::new("index cache", true, "DISABLED", "index is rebuilt on every run"),
        Some(path) if !path.exists() => Check::new(
            "index cache",
            false,
            "NOT BUILT",
            format!("{} (run `travelrag index`)", path.display()),
        ),
        Some(path) => match VectorIndex::load(path) {
            Err(e) => Check::new("index cache", false, "UNREADABLE", format!("{:#}", e)),
            Ok(index) => {
                let metric = config.retrieval.metric.parse::<Metric>();
                let fresh = match (&articles, &described, metric) {
                    (Ok(articles), Ok((model, dims)), Ok(metric)) => {
                        let chunks: Vec<_> = articles
                            .iter()
                            .flat_map(|a| chunk_article(a, &config.chunking))
                            .collect();
                        let fingerprint = corpus_fingerprint(&chunks, &config.chunking, model);
                        index.matches(&fingerprint, model, *dims, metric)
                    }
                    _ => false,
                };
                if fresh {
                    Check::new(
                        "index cache",
                        true,
                        "OK",
                        format!("{} chunks, {}", index.len(), index.model()),
                    )
                } else {
                    Check::new(
                        "index cache",
                        false,
                        "STALE",
                        format!("{} (rebuilt on next run)", path.display()),
                    )
                }
            }
        },
    });

    checks
}

pub fn run_status(config: &Config, config_path: &Path, config_found: bool) -> Result<()> {
    let checks = collect_checks(config, config_path, config_found);

    println!("{:<14} {:<12} DETAIL", "CHECK", "STATUS");
    for c in &checks {
        println!("{:<14} {:<12} {}", c.name, c.status, c.detail);
    }

    let failing = checks.iter().filter(|c| !c.ok).count();
    println!();
    if failing == 0 {
        println!("Ready. Try `travelrag ask \"What are the top attractions in Paris?\"`");
    } else {
        println!("{} check(s) need attention.", failing);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn find<'a>(checks: &'a [Check], name: &str) -> &'a Check {
        checks.iter().find(|c| c.name == name).unwrap()
    }

    #[test]
    fn test_missing_data_dir_points_to_collect() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::minimal();
        config.data.dir = tmp.path().join("nope");
        let checks = collect_checks(&config, Path::new("travelrag.toml"), true);

        let data = find(&checks, "data");
        assert!(!data.ok);
        assert_eq!(data.status, "MISSING");
        assert!(data.detail.contains("travelrag collect"));
        assert!(find(&checks, "config").ok);
    }

    #[test]
    fn test_cache_freshness() {
        let tmp = TempDir::new().unwrap();
        let data_dir = tmp.path().join("data");
        std::fs::create_dir_all(&data_dir).unwrap();
        std::fs::write(
            data_dir.join("Wikivoyage_Rome.txt"),
            "Source: Wikivoyage\nTitle: Rome\nContent:\nRome has ancient ruins.",
        )
        .unwrap();

        let mut config = Config::minimal();
        config.data.dir = data_dir;
        config.embedding.provider = "hashing".to_string();
        config.embedding.dims = Some(16);
        let cache = tmp.path().join("index.json");
        config.index.cache_path = Some(cache.clone());

        let checks = collect_checks(&config, Path::new("travelrag.toml"), true);
        assert_eq!(find(&checks, "index cache").status, "NOT BUILT");

        let articles = corpus::load_articles(&config.data).unwrap();
        let chunks: Vec<_> = articles
            .iter()
            .flat_map(|a| chunk_article(a, &config.chunking))
            .collect();
        let fingerprint = corpus_fingerprint(&chunks, &config.chunking, "hashing-16");
        let vectors = vec![vec![1.0; 16]; chunks.len()];
        VectorIndex::from_vectors(
            "hashing-16",
            16,
            Metric::Cosine,
            &fingerprint,
            chunks,
            vectors,
        )
        .unwrap()
        .save(&cache)
        .unwrap();

        let checks = collect_checks(&config, Path::new("travelrag.toml"), true);
        assert_eq!(find(&checks, "index cache").status, "OK");

        // Same corpus and model, different scoring.
        config.retrieval.metric = "euclidean".to_string();
        let checks = collect_checks(&config, Path::new("travelrag.toml"), true);
        assert_eq!(find(&checks, "index cache").status, "STALE");
        config.retrieval.metric = "cosine".to_string();

        config.chunking.chunk_size = 10;
        config.chunking.chunk_overlap = 2;
        let checks = collect_checks(&config, Path::new("travelrag.toml"), true);
        assert_eq!(find(&checks, "index cache").status, "STALE");
    }
}
