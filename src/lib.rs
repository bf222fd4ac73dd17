//! # TravelRAG
//!
//! A retrieval-augmented travel question answering service.
//!
//! TravelRAG downloads travel articles from Wikipedia and Wikivoyage, splits
//! them into overlapping chunks, embeds the chunks into an in-memory vector
//! index, and answers questions by handing the nearest chunks to a chat
//! completion model. Answers come back with the sources they were drawn from,
//! through a CLI or a small web interface.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Collector │──▶│ travel_data/ │──▶│ Chunk+Embed  │
//! │ MediaWiki │   │  *.txt files │   │ VectorIndex  │
//! └───────────┘   └──────────────┘   └──────┬───────┘
//!                                           │ top-k
//!                                           ▼
//!                     ┌──────────┐    ┌───────────┐
//!                     │ CLI/HTTP │◀───│ RagEngine │──▶ chat completion API
//!                     └──────────┘    └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! travelrag collect                                   # download articles
//! travelrag index                                     # embed and cache the index
//! travelrag ask "What are the top attractions in Paris?"
//! travelrag serve                                     # web UI on 127.0.0.1:8501
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types |
//! | [`collector`] | MediaWiki article downloader |
//! | [`corpus`] | Article file loading and text cleanup |
//! | [`chunk`] | Overlapping window and section chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Exact vector index, cache, and retriever |
//! | [`llm`] | Chat completion provider |
//! | [`rag`] | Prompt building and answering |
//! | [`server`] | Web interface and JSON API |
//! | [`search`] | `index`, `search`, and `ask` commands |
//! | [`stats`] | Chunking statistics |
//! | [`status`] | Setup checks |
//! | [`progress`] | Progress reporting |

pub mod chunk;
pub mod collector;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod index;
pub mod llm;
pub mod models;
pub mod progress;
pub mod rag;
pub mod search;
pub mod server;
pub mod stats;
pub mod status;
