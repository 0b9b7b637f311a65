//! SIF cell embeddings for one attribute
//!
//! Build path: tokenize cells, train a word model, weight tokens by smooth
//! inverse frequency and average each distinct value's word vectors.
//! Load path: read a previously persisted artifact instead.

use std::collections::{BTreeSet, HashMap};

use crate::artifact::{AttributeEmbedding, VectorTable};
use crate::config::EmbeddingConfig;
use crate::error::{EmbeddingError, Result};
use crate::model::{SubwordModel, TrainingParams, WordEmbeddingModel};
use crate::storage::ArtifactStore;
use crate::weights::VocabularyWeights;

/// Builds or loads the embedding of a single attribute
pub struct CellEmbedder<'a> {
    attribute: &'a str,
    config: &'a EmbeddingConfig,
}

impl<'a> CellEmbedder<'a> {
    pub fn new(attribute: &'a str, config: &'a EmbeddingConfig) -> Self {
        Self { attribute, config }
    }

    /// Load or build according to the configuration, persisting fresh builds
    /// when requested
    pub fn embed(&self, values: &[String], store: &ArtifactStore) -> Result<AttributeEmbedding> {
        if self.config.load {
            return self.load(store);
        }

        let embedding = self.build(values)?;
        if self.config.persist {
            log::info!("[{}] save vec and vocab", self.attribute);
            store.save(&embedding)?;
        }
        Ok(embedding)
    }

    /// Read the persisted artifact; no training happens
    pub fn load(&self, store: &ArtifactStore) -> Result<AttributeEmbedding> {
        log::info!("[{}] load vec and vocab", self.attribute);
        let embedding = store.load(self.attribute, &self.config.null_marker)?;
        if embedding.dimension() != self.config.dimension {
            log::warn!(
                "[{}] loaded embedding has dimension {}, configured {}",
                self.attribute,
                embedding.dimension(),
                self.config.dimension
            );
        }
        Ok(embedding)
    }

    /// Train on `values` and aggregate cell vectors
    pub fn build(&self, values: &[String]) -> Result<AttributeEmbedding> {
        let (cells, corpus) = self.tokenize(values)?;

        log::info!("[{}] train language model", self.attribute);
        let model = SubwordModel::train(&corpus, &TrainingParams::from(self.config))
            .map_err(|e| self.tag(e))?;

        self.aggregate(&cells, &corpus, &model)
    }

    /// Non-null cells and their token sequences, in row order
    fn tokenize<'v>(&self, values: &'v [String]) -> Result<(Vec<&'v str>, Vec<Vec<String>>)> {
        log::info!("[{}] tokenize cell", self.attribute);
        let cells: Vec<&str> = values
            .iter()
            .map(String::as_str)
            .filter(|cell| *cell != self.config.null_marker)
            .collect();
        if cells.is_empty() {
            return Err(EmbeddingError::training(
                self.attribute,
                "attribute has no non-null cells",
            ));
        }

        let mut corpus = Vec::with_capacity(cells.len());
        for cell in &cells {
            let tokens = self.config.tokenizer.tokenize(cell);
            if tokens.is_empty() {
                return Err(EmbeddingError::training(
                    self.attribute,
                    format!("tokenizer produced no tokens for cell '{}'", cell),
                ));
            }
            corpus.push(tokens);
        }
        Ok((cells, corpus))
    }

    /// Weight tokens and combine word vectors into one vector per distinct cell
    pub(crate) fn aggregate(
        &self,
        cells: &[&str],
        corpus: &[Vec<String>],
        model: &dyn WordEmbeddingModel,
    ) -> Result<AttributeEmbedding> {
        let dimension = model.dimension();
        let max_length = corpus.iter().map(Vec::len).max().unwrap_or(0);

        log::info!("[{}] compute weights", self.attribute);
        let weights =
            VocabularyWeights::compute(corpus, self.config.smoothing).map_err(|e| self.tag(e))?;

        log::info!("[{}] create vector map", self.attribute);
        let tokens: Vec<&str> = weights.tokens().iter().map(String::as_str).collect();
        let token_vectors = model.vectors_of(&tokens)?;

        let distinct: Vec<String> = cells
            .iter()
            .copied()
            .collect::<BTreeSet<&str>>()
            .into_iter()
            .map(str::to_string)
            .collect();

        // Single-token cells whose token is the cell itself: values and tokens coincide
        let (values, rows) = if max_length == 1 && distinct.as_slice() == weights.tokens() {
            (distinct, token_vectors)
        } else {
            let tokens_of: HashMap<&str, &Vec<String>> =
                cells.iter().copied().zip(corpus.iter()).collect();
            let mut rows = Vec::with_capacity(distinct.len());
            for value in &distinct {
                let cell_tokens = tokens_of.get(value.as_str()).ok_or_else(|| {
                    EmbeddingError::training(self.attribute, format!("no tokens for '{}'", value))
                })?;
                rows.push(self.cell_vector(cell_tokens, &weights, &token_vectors, dimension)?);
            }
            (distinct, rows)
        };

        let table = VectorTable::with_sentinel(dimension, rows)?;
        AttributeEmbedding::new(self.attribute, values, table, &self.config.null_marker)
    }

    /// Word vector for single tokens, weighted centroid `(w · V) / sum(w)` otherwise
    fn cell_vector(
        &self,
        cell_tokens: &[String],
        weights: &VocabularyWeights,
        token_vectors: &[Vec<f32>],
        dimension: usize,
    ) -> Result<Vec<f32>> {
        let rows = cell_tokens
            .iter()
            .map(|token| {
                weights.index_of(token).ok_or_else(|| {
                    EmbeddingError::training(
                        self.attribute,
                        format!("token '{}' missing from vocabulary", token),
                    )
                })
            })
            .collect::<Result<Vec<usize>>>()?;

        if let [only] = rows.as_slice() {
            return Ok(token_vectors[*only].clone());
        }

        let mut sum = vec![0.0_f64; dimension];
        let mut total_weight = 0.0_f64;
        for &row in &rows {
            let w = weights.weight_at(row);
            total_weight += w;
            sum.iter_mut()
                .zip(token_vectors[row].iter())
                .for_each(|(s, v)| *s += w * f64::from(*v));
        }
        Ok(sum.into_iter().map(|s| (s / total_weight) as f32).collect())
    }

    fn tag(&self, err: EmbeddingError) -> EmbeddingError {
        match err {
            EmbeddingError::Training { reason, .. } => {
                EmbeddingError::training(self.attribute, reason)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigOverrides, Tokenizer};
    use tempfile::TempDir;

    fn config() -> EmbeddingConfig {
        EmbeddingConfig::default()
            .merge(ConfigOverrides::new().dimension(8).epochs(2))
            .unwrap()
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn corpus(values: &[&str]) -> Vec<Vec<String>> {
        values
            .iter()
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .collect()
    }

    /// Same model the build path trains, retrained independently
    fn reference_model(values: &[&str], config: &EmbeddingConfig) -> SubwordModel {
        SubwordModel::train(&corpus(values), &TrainingParams::from(config)).unwrap()
    }

    #[test]
    fn test_scenario_two_tokens() {
        let cells = ["ab", "ab", "ab cd"];
        let config = EmbeddingConfig::default()
            .merge(ConfigOverrides::new().dimension(8).epochs(2).smoothing(1e-6))
            .unwrap();
        let embedding = CellEmbedder::new("t", &config).build(&strings(&cells)).unwrap();
        let model = reference_model(&cells, &config);

        assert_eq!(embedding.values(), ["ab", "ab cd"]);
        let wv_ab = model.vector_of("ab").unwrap();
        let wv_cd = model.vector_of("cd").unwrap();
        assert_eq!(embedding.vector("ab").unwrap(), wv_ab.as_slice());

        let weights = VocabularyWeights::compute(&corpus(&cells), 1e-6).unwrap();
        let (w_ab, w_cd) = (weights.weight("ab").unwrap(), weights.weight("cd").unwrap());
        assert!(w_ab < w_cd);

        let cell = embedding.vector("ab cd").unwrap();
        for i in 0..8 {
            let expected = (w_ab * f64::from(wv_ab[i]) + w_cd * f64::from(wv_cd[i])) / (w_ab + w_cd);
            assert!((f64::from(cell[i]) - expected).abs() < 1e-6);
            // rarer token dominates
            assert!((f64::from(cell[i]) - f64::from(wv_cd[i])).abs()
                <= (f64::from(cell[i]) - f64::from(wv_ab[i])).abs() + 1e-6);
        }
    }

    #[test]
    fn test_single_token_cells_reuse_word_vectors() {
        let cells = ["boston", "chicago", "boston", "denver"];
        let config = config();
        let embedding = CellEmbedder::new("city", &config).build(&strings(&cells)).unwrap();
        let model = reference_model(&cells, &config);

        assert_eq!(embedding.values(), ["boston", "chicago", "denver"]);
        for city in ["boston", "chicago", "denver"] {
            assert_eq!(embedding.vector(city).unwrap(), model.vector_of(city).unwrap().as_slice());
        }
    }

    #[test]
    fn test_equal_weights_give_arithmetic_mean() {
        // every token appears exactly once so all weights are equal
        let cells = ["red apple", "green pear"];
        let config = config();
        let embedding = CellEmbedder::new("fruit", &config).build(&strings(&cells)).unwrap();
        let model = reference_model(&cells, &config);

        let red = model.vector_of("red").unwrap();
        let apple = model.vector_of("apple").unwrap();
        let cell = embedding.vector("red apple").unwrap();
        for i in 0..8 {
            assert!((cell[i] - (red[i] + apple[i]) / 2.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_null_marker_maps_to_sentinel() {
        let config = config();
        let embedding = CellEmbedder::new("name", &config)
            .build(&strings(&["ann lee", "_nan_", "bo"]))
            .unwrap();
        assert_eq!(embedding.values(), ["ann lee", "bo"]);
        assert_eq!(embedding.index().get("_nan_"), Some(2));
        assert_eq!(embedding.vector("_nan_").unwrap(), vec![-1.0_f32; 8].as_slice());
    }

    #[test]
    fn test_value_differing_from_its_token_is_indexed_by_value() {
        let config = config();
        let embedding = CellEmbedder::new("code", &config)
            .build(&strings(&[" x1 ", "x1", "y2"]))
            .unwrap();
        assert_eq!(embedding.values(), [" x1 ", "x1", "y2"]);
        assert_eq!(embedding.vector(" x1 ").unwrap(), embedding.vector("x1").unwrap());
    }

    #[test]
    fn test_empty_tokenization_is_training_error() {
        let config = config();
        let result = CellEmbedder::new("notes", &config).build(&strings(&["fine", "   "]));
        assert!(matches!(
            result,
            Err(EmbeddingError::Training { attribute, .. }) if attribute == "notes"
        ));
    }

    #[test]
    fn test_all_null_column_is_training_error() {
        let config = config();
        let result = CellEmbedder::new("notes", &config).build(&strings(&["_nan_", "_nan_"]));
        assert!(matches!(result, Err(EmbeddingError::Training { .. })));
    }

    #[test]
    fn test_custom_tokenizer() {
        let config = EmbeddingConfig::default()
            .merge(
                ConfigOverrides::new()
                    .dimension(4)
                    .epochs(1)
                    .tokenizer(Tokenizer::new(|s| s.split('-').map(str::to_string).collect())),
            )
            .unwrap();
        let embedding = CellEmbedder::new("sku", &config)
            .build(&strings(&["ab-12", "ab-13", "cd"]))
            .unwrap();
        assert_eq!(embedding.values(), ["ab-12", "ab-13", "cd"]);
        assert_eq!(embedding.table().len(), 4);
    }

    #[test]
    fn test_persist_then_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp_dir.path());
        let cells = strings(&["st mary hospital", "county clinic", "st mary hospital", "_nan_"]);

        let save = EmbeddingConfig::default()
            .merge(ConfigOverrides::new().dimension(8).epochs(2).persist(true))
            .unwrap();
        let built = CellEmbedder::new("hospital", &save).embed(&cells, &store).unwrap();

        let load = save.merge(ConfigOverrides::new().load(true)).unwrap();
        let loaded = CellEmbedder::new("hospital", &load).embed(&[], &store).unwrap();

        assert_eq!(loaded, built);
        assert_eq!(loaded.lookup(&["county clinic"]).unwrap(), built.lookup(&["county clinic"]).unwrap());
    }

    #[test]
    fn test_load_without_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp_dir.path());
        let config = config().merge(ConfigOverrides::new().load(true)).unwrap();
        assert!(matches!(
            CellEmbedder::new("hospital", &config).embed(&[], &store),
            Err(EmbeddingError::MissingArtifact { .. })
        ));
    }
}
