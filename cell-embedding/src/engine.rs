//! Embedding engine
//!
//! Coordinates one `CellEmbedder` per textual attribute and exposes vector
//! lookup by attribute name.

use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;

use crate::artifact::AttributeEmbedding;
use crate::config::{ConfigOverrides, EmbeddingConfig, EmbeddingStrategy};
use crate::dataset::TabularSource;
use crate::error::{EmbeddingError, Result};
use crate::sif::CellEmbedder;
use crate::storage::ArtifactStore;

/// Per-attribute cell embeddings for a dataset
///
/// Artifacts are immutable once trained or loaded and are replaced as a
/// whole by the next successful `train` call.
#[derive(Debug, Default)]
pub struct EmbeddingEngine {
    config: EmbeddingConfig,
    attributes: Vec<String>,
    artifacts: HashMap<String, Arc<AttributeEmbedding>>,
}

impl EmbeddingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from explicit settings instead of the defaults
    pub fn with_config(config: EmbeddingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    /// Settings used by the last successful `train` call
    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    /// Build or load embeddings for every textual attribute of `dataset`
    ///
    /// On failure no artifact is replaced; the error lists every attribute
    /// whose pipeline failed and carries the first failure in attribute order.
    pub fn train(&mut self, dataset: &dyn TabularSource, overrides: ConfigOverrides) -> Result<()> {
        let config = self.config.merge(overrides)?;
        match config.strategy {
            EmbeddingStrategy::Attribute => {}
            EmbeddingStrategy::Pretrained => {
                return Err(EmbeddingError::not_implemented("pretrained embeddings"));
            }
        }

        let store = ArtifactStore::new(&config.storage_path);
        if !config.load {
            store.ensure_root()?;
        }

        let attributes = dataset.to_embed();
        log::info!(
            "Embedding {} attributes with {} worker(s)",
            attributes.len(),
            config.workers
        );

        let results = if config.workers > 1 && attributes.len() > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.workers)
                .thread_name(|i| format!("cell-embed-{}", i))
                .build()
                .map_err(|e| {
                    EmbeddingError::configuration(format!("failed to start worker pool: {}", e))
                })?;
            pool.install(|| {
                attributes
                    .par_iter()
                    .map(|attr| embed_attribute(dataset, attr, &config, &store))
                    .collect::<Vec<_>>()
            })
        } else {
            attributes
                .iter()
                .map(|attr| embed_attribute(dataset, attr, &config, &store))
                .collect()
        };

        let mut artifacts = HashMap::with_capacity(attributes.len());
        let mut failed = Vec::new();
        let mut first_error = None;
        for (attr, result) in attributes.iter().zip(results) {
            match result {
                Ok(embedding) => {
                    artifacts.insert(attr.clone(), Arc::new(embedding));
                }
                Err(e) => {
                    log::error!("[{}] embedding failed: {}", attr, e);
                    failed.push(attr.clone());
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        if let Some(source) = first_error {
            return Err(EmbeddingError::AttributeFailures {
                failed,
                source: Box::new(source),
            });
        }

        self.config = config;
        self.attributes = attributes;
        self.artifacts = artifacts;
        Ok(())
    }

    /// Stacked vectors of `values` for `attribute`, in input order
    pub fn lookup<S: AsRef<str>>(&self, values: &[S], attribute: &str) -> Result<Vec<Vec<f32>>> {
        self.embedding(attribute)?.lookup(values)
    }

    /// Caller-facing lookup; the attribute strategy requires an attribute
    pub fn get_embedding<S: AsRef<str>>(
        &self,
        values: &[S],
        attribute: Option<&str>,
    ) -> Result<Vec<Vec<f32>>> {
        match (self.config.strategy, attribute) {
            (EmbeddingStrategy::Attribute, Some(attr)) => self.lookup(values, attr),
            (EmbeddingStrategy::Attribute, None) => Err(EmbeddingError::configuration(
                "an attribute is required with attribute embeddings",
            )),
            (EmbeddingStrategy::Pretrained, _) => {
                Err(EmbeddingError::not_implemented("pretrained embeddings"))
            }
        }
    }

    /// Cosine similarity between the vectors of two values of an attribute
    pub fn similarity(&self, attribute: &str, a: &str, b: &str) -> Result<f32> {
        let embedding = self.embedding(attribute)?;
        Ok(cosine_similarity(embedding.vector(a)?, embedding.vector(b)?))
    }

    /// Cosine distance (`1 - similarity`) between two values of an attribute
    pub fn distance(&self, attribute: &str, a: &str, b: &str) -> Result<f32> {
        Ok(1.0 - self.similarity(attribute, a, b)?)
    }

    pub fn artifact(&self, attribute: &str) -> Option<&Arc<AttributeEmbedding>> {
        self.artifacts.get(attribute)
    }

    /// Embedded attributes in dataset order
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn dimension(&self, attribute: &str) -> Option<usize> {
        self.artifacts.get(attribute).map(|e| e.dimension())
    }

    fn embedding(&self, attribute: &str) -> Result<&AttributeEmbedding> {
        self.artifacts
            .get(attribute)
            .map(Arc::as_ref)
            .ok_or_else(|| EmbeddingError::UnknownAttribute(attribute.to_string()))
    }
}

fn embed_attribute(
    dataset: &dyn TabularSource,
    attribute: &str,
    config: &EmbeddingConfig,
    store: &ArtifactStore,
) -> Result<AttributeEmbedding> {
    let embedder = CellEmbedder::new(attribute, config);
    if config.load {
        embedder.load(store)
    } else {
        embedder.embed(&dataset.column(attribute)?, store)
    }
}

/// Cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::InMemoryDataset;
    use tempfile::TempDir;

    fn hospital() -> InMemoryDataset {
        InMemoryDataset::new()
            .with_column("zip", ["35233", "35233", "36116"])
            .with_text_column(
                "name",
                ["st vincent hospital", "st vincent hospital", "baptist medical center"],
            )
            .with_text_column("city", ["birmingham", "birmingham", "montgomery"])
            .with_text_column("state", ["al", "_nan_", "al"])
    }

    fn overrides(dir: &TempDir) -> ConfigOverrides {
        ConfigOverrides::new()
            .dimension(8)
            .epochs(2)
            .storage_path(dir.path())
    }

    #[test]
    fn test_train_and_lookup() {
        let dir = TempDir::new().unwrap();
        let mut engine = EmbeddingEngine::new();
        engine.train(&hospital(), overrides(&dir)).unwrap();

        assert_eq!(engine.attributes(), ["name", "city", "state"]);
        assert!(engine.artifact("zip").is_none());
        assert_eq!(engine.dimension("city"), Some(8));

        let vectors = engine
            .lookup(&["montgomery", "birmingham", "_nan_"], "city")
            .unwrap();
        assert_eq!(vectors.len(), 3);
        assert!(vectors.iter().all(|v| v.len() == 8));
        assert_eq!(vectors[2], vec![-1.0; 8]);
        assert_ne!(vectors[0], vectors[1]);
    }

    #[test]
    fn test_lookup_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let mut engine = EmbeddingEngine::new();
        engine.train(&hospital(), overrides(&dir)).unwrap();

        let values = ["baptist medical center", "st vincent hospital"];
        let first = engine.lookup(&values, "name").unwrap();
        let second = engine.lookup(&values, "name").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unseen_value_fails_lookup() {
        let dir = TempDir::new().unwrap();
        let mut engine = EmbeddingEngine::new();
        engine.train(&hospital(), overrides(&dir)).unwrap();

        assert!(matches!(
            engine.lookup(&["mobile"], "city"),
            Err(EmbeddingError::Lookup { attribute, value }) if attribute == "city" && value == "mobile"
        ));
        assert!(matches!(
            engine.lookup(&["al"], "zip"),
            Err(EmbeddingError::UnknownAttribute(_))
        ));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let dir = TempDir::new().unwrap();
        let mut sequential = EmbeddingEngine::new();
        sequential
            .train(&hospital(), overrides(&dir).workers(1))
            .unwrap();
        let mut parallel = EmbeddingEngine::new();
        parallel.train(&hospital(), overrides(&dir).workers(2)).unwrap();

        for attr in ["name", "city", "state"] {
            assert_eq!(sequential.artifact(attr), parallel.artifact(attr));
        }
    }

    #[test]
    fn test_persist_then_load() {
        let dir = TempDir::new().unwrap();
        let mut trained = EmbeddingEngine::new();
        trained
            .train(&hospital(), overrides(&dir).persist(true))
            .unwrap();
        assert!(dir.path().join("cityvec.bin").is_file());
        assert!(dir.path().join("namevocab.json").is_file());

        let mut loaded = EmbeddingEngine::new();
        loaded
            .train(&hospital(), overrides(&dir).load(true).workers(2))
            .unwrap();
        for attr in ["name", "city", "state"] {
            assert_eq!(trained.artifact(attr), loaded.artifact(attr));
        }
    }

    #[test]
    fn test_load_without_persisted_artifacts() {
        let dir = TempDir::new().unwrap();
        let mut engine = EmbeddingEngine::new();
        let err = engine
            .train(&hospital(), overrides(&dir).load(true))
            .unwrap_err();
        match err {
            EmbeddingError::AttributeFailures { failed, source } => {
                assert_eq!(failed, vec!["name", "city", "state"]);
                assert!(matches!(*source, EmbeddingError::MissingArtifact { ref attribute, .. } if attribute == "name"));
            }
            other => panic!("expected AttributeFailures, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_train_keeps_previous_artifacts() {
        let dir = TempDir::new().unwrap();
        let mut engine = EmbeddingEngine::new();
        engine.train(&hospital(), overrides(&dir)).unwrap();
        let before = engine.lookup(&["al"], "state").unwrap();

        let broken = hospital().with_text_column("notes", ["ok", "  "]);
        let err = engine
            .train(&broken, overrides(&dir).workers(2))
            .unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::AttributeFailures { ref failed, .. } if failed == &["notes"]
        ));
        assert!(engine.artifact("notes").is_none());
        assert_eq!(engine.lookup(&["al"], "state").unwrap(), before);
        assert_eq!(engine.config().workers, 1);
    }

    #[test]
    fn test_pretrained_strategy_not_implemented() {
        let dir = TempDir::new().unwrap();
        let mut engine = EmbeddingEngine::new();
        let result = engine.train(&hospital(), overrides(&dir).strategy("pretrained"));
        assert!(matches!(result, Err(EmbeddingError::NotImplemented(_))));
    }

    #[test]
    fn test_pretrained_strategy_creates_no_storage_dir() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("emb");
        let mut engine = EmbeddingEngine::new();
        let result = engine.train(
            &hospital(),
            ConfigOverrides::new()
                .strategy("pretrained")
                .storage_path(&root),
        );
        assert!(matches!(result, Err(EmbeddingError::NotImplemented(_))));
        assert!(!root.exists());
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let dir = TempDir::new().unwrap();
        let mut engine = EmbeddingEngine::new();
        let result = engine.train(&hospital(), overrides(&dir).strategy("bert"));
        assert!(matches!(result, Err(EmbeddingError::InvalidEmbeddingType(_))));
    }

    #[test]
    fn test_get_embedding_requires_attribute() {
        let dir = TempDir::new().unwrap();
        let mut engine = EmbeddingEngine::new();
        engine.train(&hospital(), overrides(&dir)).unwrap();

        assert_eq!(
            engine.get_embedding(&["al"], Some("state")).unwrap(),
            engine.lookup(&["al"], "state").unwrap()
        );
        assert!(matches!(
            engine.get_embedding(&["al"], None),
            Err(EmbeddingError::Configuration(_))
        ));
    }

    #[test]
    fn test_similarity_of_value_with_itself() {
        let dir = TempDir::new().unwrap();
        let mut engine = EmbeddingEngine::new();
        engine.train(&hospital(), overrides(&dir)).unwrap();

        let sim = engine.similarity("city", "birmingham", "birmingham").unwrap();
        assert!((sim - 1.0).abs() < 1e-5);
        assert!(engine.distance("city", "birmingham", "birmingham").unwrap().abs() < 1e-5);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = [1.0_f32, 0.0, 0.0];
        let b = [0.0_f32, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = [1.0_f32, 0.0, 0.0];
        let b = [-1.0_f32, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 0.001);
    }
}
