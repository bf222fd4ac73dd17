//! Corpus and chunking statistics.
//!
//! Loads and chunks the corpus without embedding anything and prints what
//! the index would contain. Used by `travelrag chunks` to check chunking
//! settings before paying for an index build.

use anyhow::Result;

use crate::chunk::chunk_article;
use crate::config::Config;
use crate::corpus;
use crate::models::Chunk;
use crate::progress::format_number;

/// Summary of chunk lengths, in characters.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkStats {
    pub count: usize,
    pub total_chars: usize,
    pub min: usize,
    pub max: usize,
    pub avg: f64,
}

pub fn chunk_stats(chunks: &[Chunk]) -> ChunkStats {
    let lengths: Vec<usize> = chunks.iter().map(|c| c.text.chars().count()).collect();
    let total_chars: usize = lengths.iter().sum();
    ChunkStats {
        count: lengths.len(),
        total_chars,
        min: lengths.iter().copied().min().unwrap_or(0),
        max: lengths.iter().copied().max().unwrap_or(0),
        avg: if lengths.is_empty() {
            0.0
        } else {
            total_chars as f64 / lengths.len() as f64
        },
    }
}

/// Run the chunks command: chunk every article and print a summary.
pub fn run_chunks(config: &Config) -> Result<()> {
    let articles = corpus::load_articles(&config.data)?;

    println!("TravelRAG Chunking Overview");
    println!("===========================");
    println!();
    println!("  Data dir:    {}", config.data.dir.display());
    println!(
        "  Strategy:    {} (size {}, overlap {})",
        config.chunking.strategy, config.chunking.chunk_size, config.chunking.chunk_overlap
    );
    println!("  Articles:    {}", articles.len());

    if articles.is_empty() {
        println!();
        println!("No articles found. Run `travelrag collect` first.");
        return Ok(());
    }

    println!();
    println!(
        "  {:<40} {:<12} {:>10} {:>8}",
        "FILE", "SITE", "CHARS", "CHUNKS"
    );
    println!("  {}", "-".repeat(74));

    let mut all_chunks = Vec::new();
    for article in &articles {
        let chunks = chunk_article(article, &config.chunking);
        println!(
            "  {:<40} {:<12} {:>10} {:>8}",
            article.source_file,
            article.site,
            format_number(article.body.chars().count() as u64),
            chunks.len()
        );
        all_chunks.extend(chunks);
    }

    let stats = chunk_stats(&all_chunks);
    println!();
    println!("  Chunks:      {}", format_number(stats.count as u64));
    println!("  Characters:  {}", format_number(stats.total_chars as u64));
    println!(
        "  Chunk size:  avg {:.1}, min {}, max {}",
        stats.avg, stats.min, stats.max
    );
    println!();

    Ok(())
}
