//! Word embedding models
//!
//! A word model is trained on one attribute's corpus and then answers
//! vector lookups for any token, including tokens it never saw.

mod subword;

pub use subword::SubwordModel;

use crate::config::EmbeddingConfig;
use crate::error::Result;

/// Trained word-to-vector mapping
///
/// Implementations must be `Send + Sync` so attribute pipelines can run on
/// worker threads.
pub trait WordEmbeddingModel: Send + Sync {
    /// Vector dimension
    fn dimension(&self) -> usize;

    /// Vector for a single word
    fn vector_of(&self, word: &str) -> Result<Vec<f32>>;

    /// Vectors for many words, aligned with the input order
    fn vectors_of(&self, words: &[&str]) -> Result<Vec<Vec<f32>>> {
        words.iter().map(|word| self.vector_of(word)).collect()
    }
}

/// Hyperparameters for training a word model
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingParams {
    pub dimension: usize,
    pub window: usize,
    pub min_count: usize,
    /// Words processed between learning-rate updates
    pub batch_size: usize,
    pub epochs: usize,
    pub seed: u64,
    /// Negative samples per positive pair
    pub negative: usize,
    pub learning_rate: f32,
    /// Shortest character n-gram
    pub min_n: usize,
    /// Longest character n-gram
    pub max_n: usize,
    /// Hash buckets shared by all n-grams
    pub buckets: usize,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            dimension: 128,
            window: 3,
            min_count: 1,
            batch_size: 100,
            epochs: 5,
            seed: 1,
            negative: 5,
            learning_rate: 0.025,
            min_n: 3,
            max_n: 6,
            buckets: 1 << 15,
        }
    }
}

impl From<&EmbeddingConfig> for TrainingParams {
    fn from(config: &EmbeddingConfig) -> Self {
        Self {
            dimension: config.dimension,
            window: config.window,
            min_count: config.min_count,
            batch_size: config.batch_size,
            epochs: config.epochs,
            seed: config.seed,
            ..Self::default()
        }
    }
}
