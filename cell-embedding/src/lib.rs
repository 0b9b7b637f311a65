//! Cell Embeddings for Tabular Data
//!
//! Fixed-length vectors for the distinct textual values ("cells") of a
//! dataset's columns, so statistical routines can treat text numerically.
//!
//! ## Features
//!
//! - **Per-attribute word models** - Subword skip-gram trained on each column's tokens
//! - **SIF weighting** - Rare tokens count more: `a / (a + freq)`
//! - **Weighted centroids** - One vector per distinct cell, plus a null sentinel row
//! - **Persistence** - Two files per attribute, reloadable without retraining
//! - **Parallel attributes** - Independent per-column pipelines on a worker pool
//!
//! ## Example
//!
//! ```ignore
//! use cell_embedding::{ConfigOverrides, EmbeddingEngine, InMemoryDataset};
//!
//! let dataset = InMemoryDataset::new()
//!     .with_text_column("name", ["st vincent hospital", "baptist medical center"])
//!     .with_text_column("city", ["birmingham", "montgomery"]);
//!
//! let mut engine = EmbeddingEngine::new();
//! engine.train(
//!     &dataset,
//!     ConfigOverrides::new().dimension(64).storage_path("emb/").persist(true).workers(2),
//! )?;
//!
//! let vectors = engine.get_embedding(&["birmingham", "_nan_"], Some("city"))?;
//! ```

pub mod artifact;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod model;
pub mod sif;
pub mod storage;
pub mod weights;

// Re-exports for convenience
pub use artifact::{AttributeEmbedding, ValueIndex, VectorTable, NULL_SENTINEL};
pub use config::{
    ConfigOverrides, EmbeddingConfig, EmbeddingStrategy, Tokenizer, DEFAULT_NULL_MARKER,
};
pub use dataset::{InMemoryDataset, TabularSource};
pub use engine::{cosine_similarity, EmbeddingEngine};
pub use error::{EmbeddingError, Result};
pub use model::{SubwordModel, TrainingParams, WordEmbeddingModel};
pub use sif::CellEmbedder;
pub use storage::ArtifactStore;
pub use weights::VocabularyWeights;
