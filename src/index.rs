//! In-memory vector index over article chunks.
//!
//! The index is an exact (brute-force) store of `(Chunk, vector)` entries.
//! It is built once from the corpus, optionally cached to disk as JSON, and
//! never mutated afterwards.
//!
//! # Scoring
//!
//! | Metric | `score` (higher is closer) | `distance` (lower is closer) |
//! |--------|----------------------------|------------------------------|
//! | cosine | cosine similarity | `1 − score` |
//! | euclidean | `1 / (1 + distance)` | `‖q − v‖` |
//!
//! Results are ordered by non-increasing score; ties keep insertion order,
//! so identical queries against an unchanged index always produce identical
//! result lists.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::str::FromStr;

use crate::chunk::chunk_article;
use crate::config::{ChunkingConfig, Config};
use crate::corpus;
use crate::embedding::{self, l2_normalize, EmbeddingProvider};
use crate::models::{Chunk, SearchHit};
use crate::progress::{ProgressEvent, ProgressReporter};

/// Bumped whenever the on-disk layout changes.
const FORMAT_VERSION: u32 = 1;

/// Distance metric used for nearest-neighbor lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cosine,
    Euclidean,
}

impl FromStr for Metric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cosine" => Ok(Metric::Cosine),
            "euclidean" => Ok(Metric::Euclidean),
            other => bail!(
                "Unknown retrieval metric: '{}'. Must be cosine or euclidean.",
                other
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// Exact nearest-neighbor index of embedded chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    format_version: u32,
    model: String,
    dims: usize,
    metric: Metric,
    fingerprint: String,
    entries: Vec<Entry>,
}

impl VectorIndex {
    /// Assemble an index from chunks and their precomputed vectors.
    ///
    /// Fails unless there is exactly one vector per chunk and every vector
    /// has `dims` components.
    pub fn from_vectors(
        model: &str,
        dims: usize,
        metric: Metric,
        fingerprint: &str,
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self> {
        if chunks.len() != vectors.len() {
            bail!(
                "expected one embedding per chunk, got {} embeddings for {} chunks",
                vectors.len(),
                chunks.len()
            );
        }

        let mut entries = Vec::with_capacity(chunks.len());
        for (chunk, mut vector) in chunks.into_iter().zip(vectors) {
            if vector.len() != dims {
                bail!(
                    "embedding provider returned {} dims for chunk {}, expected {}",
                    vector.len(),
                    chunk.id,
                    dims
                );
            }
            if metric == Metric::Cosine {
                l2_normalize(&mut vector);
            }
            entries.push(Entry { chunk, vector });
        }

        Ok(Self {
            format_version: FORMAT_VERSION,
            model: model.to_string(),
            dims,
            metric,
            fingerprint: fingerprint.to_string(),
            entries,
        })
    }

    /// Embed `chunks` in batches with `provider` and index them.
    pub async fn build(
        chunks: Vec<Chunk>,
        provider: &dyn EmbeddingProvider,
        batch_size: usize,
        metric: Metric,
        fingerprint: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<Self> {
        let total = chunks.len() as u64;
        let mut vectors = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let batch_vectors = provider
                .embed(&texts)
                .await
                .with_context(|| format!("Failed to embed chunks with {}", provider.model_name()))?;
            if batch_vectors.len() != batch.len() {
                bail!(
                    "embedding provider returned {} vectors for a batch of {}",
                    batch_vectors.len(),
                    batch.len()
                );
            }
            vectors.extend(batch_vectors);
            progress.report(ProgressEvent::Embedding {
                n: vectors.len() as u64,
                total,
            });
        }

        Self::from_vectors(
            provider.model_name(),
            provider.dims(),
            metric,
            fingerprint,
            chunks,
            vectors,
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|e| &e.chunk)
    }

    /// The `min(k, len)` entries closest to `query`, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dims {
            bail!(
                "query vector has {} dims but the index was built with {}",
                query.len(),
                self.dims
            );
        }
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = query.to_vec();
        if self.metric == Metric::Cosine {
            l2_normalize(&mut query);
        }

        let mut scored: Vec<(usize, f32, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let (score, distance) = match self.metric {
                    Metric::Cosine => {
                        let sim: f32 = query.iter().zip(&e.vector).map(|(a, b)| a * b).sum();
                        (sim, 1.0 - sim)
                    }
                    Metric::Euclidean => {
                        let d = embedding::euclidean_distance(&query, &e.vector);
                        (1.0 / (1.0 + d), d)
                    }
                };
                let score = if score.is_nan() { f32::NEG_INFINITY } else { score };
                (i, score, distance)
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(rank, (i, score, distance))| SearchHit {
                rank: rank + 1,
                score,
                distance,
                chunk: self.entries[i].chunk.clone(),
            })
            .collect())
    }

    /// Write the index as JSON, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create index directory: {}", parent.display())
                })?;
            }
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create index file: {}", path.display()))?;
        serde_json::to_writer(BufWriter::new(file), self)
            .with_context(|| format!("Failed to write index file: {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open index file: {}", path.display()))?;
        let index: VectorIndex = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse index file: {}", path.display()))?;
        if index.format_version != FORMAT_VERSION {
            bail!(
                "index file {} has format version {}, expected {}",
                path.display(),
                index.format_version,
                FORMAT_VERSION
            );
        }
        if index.entries.iter().any(|e| e.vector.len() != index.dims) {
            bail!("index file {} has vectors of inconsistent size", path.display());
        }
        Ok(index)
    }

    /// True when this index was built from the same corpus, model, and metric.
    pub fn matches(&self, fingerprint: &str, model: &str, dims: usize, metric: Metric) -> bool {
        self.fingerprint == fingerprint
            && self.model == model
            && self.dims == dims
            && self.metric == metric
    }
}

/// Digest of everything that determines the index contents apart from the
/// metric: chunk texts, chunking parameters, and embedding model.
pub fn corpus_fingerprint(chunks: &[Chunk], chunking: &ChunkingConfig, model: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update(
        format!(
            "|{}|{}|{}|{}|",
            chunking.strategy, chunking.chunk_size, chunking.chunk_overlap, chunking.min_chunk_size
        )
        .as_bytes(),
    );
    for c in chunks {
        hasher.update(c.source_file.as_bytes());
        hasher.update(c.hash.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Load the corpus, chunk it, and return the index, reusing the cache file
/// when it was built from the same corpus, chunking, and model.
pub async fn load_or_build(
    config: &Config,
    provider: &dyn EmbeddingProvider,
    progress: &dyn ProgressReporter,
    force_rebuild: bool,
) -> Result<VectorIndex> {
    let metric: Metric = config.retrieval.metric.parse()?;

    let articles = corpus::load_articles(&config.data)?;
    if articles.is_empty() {
        bail!(
            "No article files found in '{}'. Run `travelrag collect` first to download the travel articles.",
            config.data.dir.display()
        );
    }

    let chunks: Vec<Chunk> = articles
        .iter()
        .flat_map(|a| chunk_article(a, &config.chunking))
        .collect();
    if chunks.is_empty() {
        bail!("The articles in '{}' produced no chunks", config.data.dir.display());
    }

    let fingerprint = corpus_fingerprint(&chunks, &config.chunking, provider.model_name());

    if let Some(cache_path) = &config.index.cache_path {
        if !force_rebuild && cache_path.exists() {
            match VectorIndex::load(cache_path) {
                Ok(index)
                    if index.matches(&fingerprint, provider.model_name(), provider.dims(), metric) =>
                {
                    tracing::info!(
                        "loaded {} chunks from index cache {}",
                        index.len(),
                        cache_path.display()
                    );
                    return Ok(index);
                }
                Ok(_) => tracing::info!("index cache is stale; rebuilding"),
                Err(e) => tracing::warn!("could not load index cache, rebuilding: {:#}", e),
            }
        }
    }

    tracing::info!(
        "embedding {} chunks from {} articles with {}",
        chunks.len(),
        articles.len(),
        provider.model_name()
    );
    let index = VectorIndex::build(
        chunks,
        provider,
        config.embedding.batch_size,
        metric,
        &fingerprint,
        progress,
    )
    .await?;

    if let Some(cache_path) = &config.index.cache_path {
        match index.save(cache_path) {
            Ok(()) => tracing::info!("saved index cache to {}", cache_path.display()),
            Err(e) => tracing::warn!("could not save index cache: {:#}", e),
        }
    }

    Ok(index)
}

/// Create the configured embedding provider and load or build its index.
pub async fn open_retriever(
    config: &Config,
    progress: &dyn ProgressReporter,
    force_rebuild: bool,
) -> Result<Retriever> {
    let provider = embedding::create_provider(&config.embedding)?;
    let index = load_or_build(config, provider.as_ref(), progress, force_rebuild).await?;
    Retriever::new(index, provider)
}

/// An index paired with the provider that embeds queries for it.
pub struct Retriever {
    index: VectorIndex,
    provider: Box<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(index: VectorIndex, provider: Box<dyn EmbeddingProvider>) -> Result<Self> {
        if index.dims() != provider.dims() {
            bail!(
                "index was built with {} dims but the embedding provider produces {}",
                index.dims(),
                provider.dims()
            );
        }
        Ok(Self { index, provider })
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Embed `query` and return its `min(k, len)` nearest chunks.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let query_vec = embedding::embed_query(self.provider.as_ref(), query).await?;
        self.index.search(&query_vec, k)
    }
}
