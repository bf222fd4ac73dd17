//! Core data models used throughout TravelRAG.
//!
//! These types represent the articles, chunks, search hits, and answers that
//! flow through the collection and retrieval pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A downloaded article, read back from the data directory.
#[derive(Debug, Clone)]
pub struct Article {
    pub title: String,
    /// Site label from the file header (`Wikipedia`, `Wikivoyage`, ...).
    pub site: String,
    pub source_url: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
    /// File name inside the data directory.
    pub source_file: String,
    /// Whitespace-normalized article text.
    pub body: String,
}

/// A window of an article's body text; the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub title: String,
    pub site: String,
    pub source_url: Option<String>,
    pub source_file: String,
    pub chunk_index: usize,
    /// Start offset in characters into the article body.
    pub start: usize,
    /// End offset (exclusive) in characters into the article body.
    pub end: usize,
    pub text: String,
    pub hash: String,
}

/// One entry of a ranked retrieval result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// 1-based position in the result list.
    pub rank: usize,
    /// Similarity; higher is closer.
    pub score: f32,
    /// Distance under the index metric; lower is closer.
    pub distance: f32,
    pub chunk: Chunk,
}

/// A cited source attached to an [`Answer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: Option<String>,
    pub source_file: String,
    /// Similarity formatted with three decimals.
    pub score: String,
    pub content: String,
}

/// The result of answering one question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub query: String,
    pub answer: String,
    pub sources: Vec<Source>,
}
