//! Embedding configuration
//!
//! `EmbeddingConfig` is built once per `train` call by merging
//! `ConfigOverrides` into the current settings, then shared read-only by
//! every attribute pipeline.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{EmbeddingError, Result};

/// Marker used for missing cells unless configured otherwise
pub const DEFAULT_NULL_MARKER: &str = "_nan_";

/// How cell embeddings are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbeddingStrategy {
    /// Train one word model per textual attribute and SIF-average cells
    #[default]
    Attribute,
    /// Shared pretrained word vectors (not supported yet)
    Pretrained,
}

impl EmbeddingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attribute => "attribute",
            Self::Pretrained => "pretrained",
        }
    }
}

impl FromStr for EmbeddingStrategy {
    type Err = EmbeddingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "attribute" | "attribute_embedding" => Ok(Self::Attribute),
            "pretrained" | "pretrained_embedding" => Ok(Self::Pretrained),
            _ => Err(EmbeddingError::InvalidEmbeddingType(s.to_string())),
        }
    }
}

impl fmt::Display for EmbeddingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type TokenizeFn = dyn Fn(&str) -> Vec<String> + Send + Sync;

/// Splits a cell's text into tokens
///
/// Wraps a plain function value. Cloning shares the same function.
#[derive(Clone)]
pub struct Tokenizer {
    func: Arc<TokenizeFn>,
}

impl Tokenizer {
    /// Wrap a tokenizing function
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&str) -> Vec<String> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
        }
    }

    /// Split on Unicode whitespace
    pub fn whitespace() -> Self {
        Self::new(|text| text.split_whitespace().map(str::to_string).collect())
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        (self.func)(text)
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::whitespace()
    }
}

impl fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Tokenizer(..)")
    }
}

/// Settings for one `train` invocation
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Word and cell vector dimension (default: 128)
    pub dimension: usize,
    /// Embedding strategy (default: attribute)
    pub strategy: EmbeddingStrategy,
    /// Cell tokenizer (default: whitespace split)
    pub tokenizer: Tokenizer,
    /// SIF smoothing constant `a` (default: 1e-6)
    pub smoothing: f64,
    /// Directory holding persisted artifacts (default: current directory)
    pub storage_path: PathBuf,
    /// Write artifacts after building (default: false)
    pub persist: bool,
    /// Load artifacts instead of training (default: false)
    pub load: bool,
    /// Words per learning-rate step during training (default: 100)
    pub batch_size: usize,
    /// Skip-gram context window (default: 3)
    pub window: usize,
    /// Minimum count for a word to get its own row (default: 1)
    pub min_count: usize,
    /// Training passes over the corpus (default: 5)
    pub epochs: usize,
    /// Training seed (default: 1)
    pub seed: u64,
    /// Parallel attribute pipelines (default: 1)
    pub workers: usize,
    /// Cell value that denotes a missing entry (default: "_nan_")
    pub null_marker: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: 128,
            strategy: EmbeddingStrategy::Attribute,
            tokenizer: Tokenizer::whitespace(),
            smoothing: 1e-6,
            storage_path: PathBuf::new(),
            persist: false,
            load: false,
            batch_size: 100,
            window: 3,
            min_count: 1,
            epochs: 5,
            seed: 1,
            workers: 1,
            null_marker: DEFAULT_NULL_MARKER.to_string(),
        }
    }
}

impl EmbeddingConfig {
    /// Apply overrides on top of this configuration and validate the result
    pub fn merge(&self, overrides: ConfigOverrides) -> Result<Self> {
        let mut merged = self.clone();

        if let Some(dimension) = overrides.dimension {
            merged.dimension = dimension;
        }
        if let Some(name) = overrides.strategy {
            merged.strategy = name.parse()?;
        }
        if let Some(tokenizer) = overrides.tokenizer {
            merged.tokenizer = tokenizer;
        }
        if let Some(a) = overrides.smoothing {
            merged.smoothing = a;
        }
        if let Some(path) = overrides.storage_path {
            merged.storage_path = path;
        }
        if let Some(persist) = overrides.persist {
            merged.persist = persist;
        }
        if let Some(load) = overrides.load {
            merged.load = load;
        }
        if let Some(batch_size) = overrides.batch_size {
            merged.batch_size = batch_size;
        }
        if let Some(window) = overrides.window {
            merged.window = window;
        }
        if let Some(min_count) = overrides.min_count {
            merged.min_count = min_count;
        }
        if let Some(epochs) = overrides.epochs {
            merged.epochs = epochs;
        }
        if let Some(seed) = overrides.seed {
            merged.seed = seed;
        }
        if let Some(workers) = overrides.workers {
            merged.workers = workers;
        }
        if let Some(marker) = overrides.null_marker {
            merged.null_marker = marker;
        }

        merged.validate()?;
        Ok(merged)
    }

    /// Check option ranges
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("dimension", self.dimension),
            ("batch_size", self.batch_size),
            ("window", self.window),
            ("min_count", self.min_count),
            ("epochs", self.epochs),
            ("workers", self.workers),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(EmbeddingError::configuration(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }
        if !(self.smoothing.is_finite() && self.smoothing > 0.0) {
            return Err(EmbeddingError::configuration(format!(
                "smoothing constant must be a positive number, got {}",
                self.smoothing
            )));
        }
        Ok(())
    }
}

/// Per-call overrides, every field optional
///
/// Deserializable so that overrides can come from a JSON document. The
/// tokenizer can only be set in code.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverrides {
    #[serde(alias = "dim")]
    pub dimension: Option<usize>,
    #[serde(rename = "type", alias = "strategy")]
    pub strategy: Option<String>,
    #[serde(skip)]
    pub tokenizer: Option<Tokenizer>,
    #[serde(alias = "a")]
    pub smoothing: Option<f64>,
    #[serde(alias = "path")]
    pub storage_path: Option<PathBuf>,
    #[serde(alias = "save")]
    pub persist: Option<bool>,
    pub load: Option<bool>,
    #[serde(alias = "batch_words")]
    pub batch_size: Option<usize>,
    pub window: Option<usize>,
    pub min_count: Option<usize>,
    pub epochs: Option<usize>,
    pub seed: Option<u64>,
    pub workers: Option<usize>,
    #[serde(alias = "null")]
    pub null_marker: Option<String>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse overrides from a JSON object
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    pub fn strategy(mut self, name: impl Into<String>) -> Self {
        self.strategy = Some(name.into());
        self
    }

    pub fn tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    pub fn smoothing(mut self, a: f64) -> Self {
        self.smoothing = Some(a);
        self
    }

    pub fn storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = Some(persist);
        self
    }

    pub fn load(mut self, load: bool) -> Self {
        self.load = Some(load);
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn window(mut self, window: usize) -> Self {
        self.window = Some(window);
        self
    }

    pub fn min_count(mut self, min_count: usize) -> Self {
        self.min_count = Some(min_count);
        self
    }

    pub fn epochs(mut self, epochs: usize) -> Self {
        self.epochs = Some(epochs);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn null_marker(mut self, marker: impl Into<String>) -> Self {
        self.null_marker = Some(marker.into());
        self
    }
}
