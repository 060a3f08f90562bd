//! # Exam Prep
//!
//! Retrieval and recommendation engine for exam preparation.
//!
//! Textbook content is cleaned, split into overlapping token windows,
//! embedded and stored in a flat nearest-neighbour index (the *passage
//! index*). A question bank is embedded by question text into a second,
//! independent index (the *question index*) whose payloads carry each
//! question's answer options. Queries are embedded with the same provider
//! and answered from either index, nearest first.
//!
//! ## Architecture
//!
//! ```text
//! documents ──▶ TextChunker ──▶ EmbeddingProvider ──▶ VectorStore<Chunk>          ──▶ RetrievalService
//! questions ─────────────────▶ EmbeddingProvider ──▶ VectorStore<QuestionRecord> ──▶ RecommendationService
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! examprep index corpus                 # build the passage index
//! examprep index questions              # build the question index
//! examprep retrieve "What is mitosis?"
//! examprep recommend "Which organelle produces energy?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`chunk`] | Text cleaning and token-window splitting |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Flat squared-L2 nearest-neighbour index |
//! | [`store`] | Persisted index + payload store |
//! | [`questions`] | Question bank table and sources |
//! | [`loader`] | Document loading from disk |
//! | [`indexer`] | Passage and question index builders |
//! | [`retrieve`] | Passage retrieval |
//! | [`recommend`] | Practice-question recommendation |
//! | [`eval`] | Recommendation quality metrics |
//! | [`stats`] | Index status overview |
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Typed errors |
//! | [`models`] | Core data types |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod eval;
pub mod index;
pub mod indexer;
pub mod loader;
pub mod models;
pub mod questions;
pub mod recommend;
pub mod retrieve;
pub mod stats;
pub mod store;

pub use error::{Error, ErrorKind, Result};
