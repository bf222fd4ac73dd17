//! `travelrag index`, `search`, and `ask` commands.

use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::index;
use crate::models::{Answer, SearchHit};
use crate::progress::ProgressReporter;
use crate::rag::RagEngine;

const EXCERPT_CHARS: usize = 240;

/// Build (or rebuild) the index and report its size.
pub async fn run_index(config: &Config, rebuild: bool, progress: &dyn ProgressReporter) -> Result<()> {
    let retriever = index::open_retriever(config, progress, rebuild).await?;
    let idx = retriever.index();

    println!("Index ready:");
    println!("  chunks:  {}", idx.len());
    println!("  model:   {} ({} dims)", idx.model(), idx.dims());
    println!("  metric:  {:?}", idx.metric());
    match &config.index.cache_path {
        Some(path) => println!("  cache:   {}", path.display()),
        None => println!("  cache:   disabled"),
    }
    Ok(())
}

pub async fn run_search(
    config: &Config,
    query: &str,
    top_k: Option<usize>,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let retriever = index::open_retriever(config, progress, false).await?;
    let hits = retriever
        .retrieve(query.trim(), top_k.unwrap_or(config.retrieval.top_k))
        .await?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for hit in &hits {
        print_hit(hit);
    }
    Ok(())
}

pub async fn run_ask(
    config: &Config,
    config_path: &Path,
    question: &str,
    top_k: Option<usize>,
    json: bool,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let engine = RagEngine::from_config(config, config_path, progress).await?;
    let answer = engine
        .answer(question, top_k.unwrap_or(engine.default_top_k()))
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print_answer(&answer);
    }
    Ok(())
}

fn print_hit(hit: &SearchHit) {
    let c = &hit.chunk;
    println!("{}. [{:.3}] {} / {}", hit.rank, hit.score, c.site, c.title);
    println!("    file: {} (chunk {})", c.source_file, c.chunk_index);
    if let Some(ref url) = c.source_url {
        println!("    url: {}", url);
    }
    println!("    excerpt: \"{}\"", excerpt(&c.text));
    println!("    id: {}", c.id);
    println!();
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.answer);
    if answer.sources.is_empty() {
        return;
    }
    println!();
    println!("Sources:");
    for (i, s) in answer.sources.iter().enumerate() {
        println!("  {}. {} [{}]", i + 1, s.title, s.score);
        match s.url {
            Some(ref url) => println!("     {}", url),
            None => println!("     {}", s.source_file),
        }
    }
}

fn excerpt(text: &str) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat.to_string();
    }
    let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_truncates_on_chars() {
        assert_eq!(excerpt("short\ntext"), "short text");
        let long = "é".repeat(300);
        let e = excerpt(&long);
        assert!(e.ends_with("..."));
        assert_eq!(e.chars().count(), EXCERPT_CHARS + 3);
    }
}
