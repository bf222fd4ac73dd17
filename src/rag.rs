//! Retrieval-augmented answering.
//!
//! [`RagEngine`] ties a [`Retriever`] to a [`CompletionProvider`]: the
//! question is embedded, the nearest chunks are formatted into a prompt, and
//! the model's reply is returned together with the chunks it was shown.

use anyhow::{bail, Result};
use std::path::Path;

use crate::config::Config;
use crate::index::{self, Retriever};
use crate::llm::{self, CompletionProvider, CompletionRequest, OpenAiChat, SYSTEM_PROMPT};
use crate::models::{Answer, SearchHit, Source};
use crate::progress::ProgressReporter;

/// Returned without calling the model when retrieval finds nothing.
pub const NO_CONTEXT_ANSWER: &str =
    "I couldn't find any relevant information to answer your question.";

const INSTRUCTION: &str = "You are a helpful travel assistant. Answer the user's question based on the provided context.\nIf the context doesn't contain enough information to fully answer the question, say so.";

/// `Source: <title>\nContent: <text>\n` per hit, joined by blank lines.
pub fn build_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|h| format!("Source: {}\nContent: {}\n", h.chunk.title, h.chunk.text))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_prompt(question: &str, hits: &[SearchHit]) -> String {
    format!(
        "{}\n\nContext:\n{}\nUser Question: {}\n\nAnswer:",
        INSTRUCTION,
        build_context(hits),
        question
    )
}

/// Characters of chunk text kept in a cited source.
const SOURCE_EXCERPT_CHARS: usize = 200;

fn to_source(hit: &SearchHit) -> Source {
    Source {
        title: hit.chunk.title.clone(),
        url: hit.chunk.source_url.clone(),
        source_file: hit.chunk.source_file.clone(),
        score: format!("{:.3}", hit.score),
        content: source_excerpt(&hit.chunk.text),
    }
}

fn source_excerpt(text: &str) -> String {
    match text.char_indices().nth(SOURCE_EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

pub struct RagEngine {
    retriever: Retriever,
    llm: Box<dyn CompletionProvider>,
    default_top_k: usize,
    max_tokens: usize,
    temperature: f32,
}

impl RagEngine {
    pub fn new(
        retriever: Retriever,
        llm: Box<dyn CompletionProvider>,
        default_top_k: usize,
        max_tokens: usize,
        temperature: f32,
    ) -> Self {
        Self {
            retriever,
            llm,
            default_top_k,
            max_tokens,
            temperature,
        }
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// Number of indexed chunks.
    pub fn chunk_count(&self) -> usize {
        self.retriever.index().len()
    }

    /// Nearest chunks for `question`. Blank questions are rejected.
    pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let question = question.trim();
        if question.is_empty() {
            bail!("question must not be empty");
        }
        if top_k == 0 {
            bail!("top_k must be >= 1");
        }
        self.retriever.retrieve(question, top_k).await
    }

    /// Ask the model to answer `question` from `hits`.
    pub async fn generate(&self, question: &str, hits: &[SearchHit]) -> Result<Answer> {
        let question = question.trim();
        if hits.is_empty() {
            return Ok(Answer {
                query: question.to_string(),
                answer: NO_CONTEXT_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let request = CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            prompt: build_prompt(question, hits),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        tracing::debug!(
            "asking {} with {} context chunks",
            self.llm.model_name(),
            hits.len()
        );
        let answer = self.llm.complete(&request).await?;

        Ok(Answer {
            query: question.to_string(),
            answer,
            sources: hits.iter().map(to_source).collect(),
        })
    }

    /// Wire the engine from configuration. The API key is checked before the
    /// index is built so a missing key fails fast.
    pub async fn from_config(
        config: &Config,
        config_path: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<Self> {
        let api_key = llm::resolve_api_key(&config.llm, config_path)?;
        let chat = OpenAiChat::new(&config.llm, api_key)?;
        let retriever = index::open_retriever(config, progress, false).await?;
        Ok(Self::new(
            retriever,
            Box::new(chat),
            config.retrieval.top_k,
            config.llm.max_tokens,
            config.llm.temperature,
        ))
    }

    /// Retrieve then generate.
    pub async fn answer(&self, question: &str, top_k: usize) -> Result<Answer> {
        let hits = self.retrieve(question, top_k).await?;
        self.generate(question, &hits).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingProvider;
    use crate::index::{Metric, VectorIndex};
    use crate::models::Chunk;
    use crate::progress::NoProgress;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct EchoLlm {
        seen: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl CompletionProvider for EchoLlm {
        fn model_name(&self) -> &str {
            "echo"
        }
        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            self.seen.lock().unwrap().push(request.clone());
            Ok("Go see the Eiffel Tower.".to_string())
        }
    }

    struct PanickingLlm;

    #[async_trait]
    impl CompletionProvider for PanickingLlm {
        fn model_name(&self) -> &str {
            "panic"
        }
        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            panic!("the model must not be called");
        }
    }

    fn chunk(i: usize, title: &str, text: &str) -> Chunk {
        Chunk {
            id: format!("c{}", i),
            title: title.to_string(),
            site: "Wikivoyage".to_string(),
            source_url: Some(format!("https://en.wikivoyage.org/wiki/{}", title)),
            source_file: format!("Wikivoyage_{}.txt", title),
            chunk_index: 0,
            start: 0,
            end: text.chars().count(),
            text: text.to_string(),
            hash: format!("h{}", i),
        }
    }

    fn hit(title: &str, text: &str, score: f32) -> SearchHit {
        SearchHit {
            rank: 1,
            score,
            distance: 1.0 - score,
            chunk: chunk(0, title, text),
        }
    }

    async fn retriever(chunks: Vec<Chunk>) -> Retriever {
        let provider = HashingProvider::new(1024);
        let index = VectorIndex::build(chunks, &provider, 8, Metric::Cosine, "fp", &NoProgress)
            .await
            .unwrap();
        Retriever::new(index, Box::new(provider)).unwrap()
    }

    #[test]
    fn test_build_context_format() {
        let hits = vec![hit("Paris", "Louvre.", 0.9), hit("Rome", "Forum.", 0.5)];
        assert_eq!(
            build_context(&hits),
            "Source: Paris\nContent: Louvre.\n\nSource: Rome\nContent: Forum.\n"
        );
    }

    #[test]
    fn test_build_prompt_contains_context_and_question() {
        let hits = vec![hit("Paris", "Louvre.", 0.9)];
        let prompt = build_prompt("What to see?", &hits);
        assert!(prompt.starts_with("You are a helpful travel assistant."));
        assert!(prompt.contains("Context:\nSource: Paris\nContent: Louvre.\n"));
        assert!(prompt.contains("User Question: What to see?"));
        assert!(prompt.ends_with("Answer:"));
    }

    #[test]
    fn test_source_content_is_an_excerpt() {
        let short = hit("Paris", "Louvre.", 0.9);
        assert_eq!(to_source(&short).content, "Louvre.");

        let exact = "a".repeat(SOURCE_EXCERPT_CHARS);
        assert_eq!(to_source(&hit("Paris", &exact, 0.9)).content, exact);

        let long = format!("{}{}", "é".repeat(SOURCE_EXCERPT_CHARS), "tail");
        let content = to_source(&hit("Paris", &long, 0.9)).content;
        assert_eq!(content, format!("{}...", "é".repeat(SOURCE_EXCERPT_CHARS)));
        assert_eq!(content.chars().count(), SOURCE_EXCERPT_CHARS + 3);
    }

    #[tokio::test]
    async fn test_answer_includes_sources_in_retrieval_order() {
        let llm = EchoLlm {
            seen: Mutex::new(Vec::new()),
        };
        let engine = RagEngine::new(
            retriever(vec![
                chunk(0, "Paris", "Top attractions in Paris include the Eiffel Tower and the Louvre."),
                chunk(1, "Tokyo", "Tokyo has busy train stations and ramen shops."),
            ])
            .await,
            Box::new(llm),
            3,
            500,
            0.7,
        );

        let answer = engine.answer("  attractions in Paris?  ", 2).await.unwrap();
        assert_eq!(answer.query, "attractions in Paris?");
        assert_eq!(answer.answer, "Go see the Eiffel Tower.");
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.sources[0].title, "Paris");
        assert_eq!(answer.sources[0].score.split('.').nth(1).map(str::len), Some(3));
    }

    #[tokio::test]
    async fn test_llm_receives_prompt_and_settings() {
        let engine_llm = std::sync::Arc::new(EchoLlm {
            seen: Mutex::new(Vec::new()),
        });

        struct Shared(std::sync::Arc<EchoLlm>);
        #[async_trait]
        impl CompletionProvider for Shared {
            fn model_name(&self) -> &str {
                "shared"
            }
            async fn complete(&self, request: &CompletionRequest) -> Result<String> {
                self.0.complete(request).await
            }
        }

        let engine = RagEngine::new(
            retriever(vec![chunk(0, "Rome", "The Colosseum is in Rome.")]).await,
            Box::new(Shared(engine_llm.clone())),
            3,
            123,
            0.2,
        );
        engine.answer("Colosseum", 3).await.unwrap();

        let seen = engine_llm.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].system, SYSTEM_PROMPT);
        assert_eq!(seen[0].max_tokens, 123);
        assert!(seen[0].prompt.contains("Source: Rome"));
    }

    #[tokio::test]
    async fn test_no_hits_skips_the_model() {
        let engine = RagEngine::new(
            retriever(vec![chunk(0, "Rome", "Forum.")]).await,
            Box::new(PanickingLlm),
            3,
            500,
            0.7,
        );
        let answer = engine.generate("anything", &[]).await.unwrap();
        assert_eq!(answer.answer, NO_CONTEXT_ANSWER);
        assert!(answer.sources.is_empty());
    }

    #[tokio::test]
    async fn test_empty_question_is_rejected() {
        let engine = RagEngine::new(
            retriever(vec![chunk(0, "Rome", "Forum.")]).await,
            Box::new(PanickingLlm),
            3,
            500,
            0.7,
        );
        assert!(engine.answer("   ", 3).await.is_err());
        assert!(engine.answer("Rome", 0).await.is_err());
    }
}
