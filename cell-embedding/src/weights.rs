//! Smooth inverse frequency word weights

use std::collections::{BTreeMap, HashMap};

use crate::error::{EmbeddingError, Result};

/// Per-token relative frequency and SIF weight `a / (a + freq)`
///
/// Tokens are kept in sorted order; `index_of` gives a token's position
/// in that order.
#[derive(Debug, Clone)]
pub struct VocabularyWeights {
    tokens: Vec<String>,
    counts: Vec<usize>,
    frequencies: Vec<f64>,
    weights: Vec<f64>,
    index: HashMap<String, usize>,
    total: usize,
}

impl VocabularyWeights {
    /// Count tokens over the corpus and derive their weights
    pub fn compute(corpus: &[Vec<String>], smoothing: f64) -> Result<Self> {
        if !(smoothing.is_finite() && smoothing > 0.0) {
            return Err(EmbeddingError::configuration(format!(
                "smoothing constant must be a positive number, got {}",
                smoothing
            )));
        }

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for sentence in corpus {
            for token in sentence {
                *counts.entry(token.as_str()).or_insert(0) += 1;
            }
        }
        let total: usize = counts.values().sum();
        if total == 0 {
            return Err(EmbeddingError::training("corpus", "no tokens to weight"));
        }

        let mut tokens = Vec::with_capacity(counts.len());
        let mut token_counts = Vec::with_capacity(counts.len());
        let mut frequencies = Vec::with_capacity(counts.len());
        let mut weights = Vec::with_capacity(counts.len());
        for (token, count) in counts {
            let freq = count as f64 / total as f64;
            tokens.push(token.to_string());
            token_counts.push(count);
            frequencies.push(freq);
            weights.push(smoothing / (smoothing + freq));
        }
        let index = tokens
            .iter()
            .enumerate()
            .map(|(i, token)| (token.clone(), i))
            .collect();

        Ok(Self {
            tokens,
            counts: token_counts,
            frequencies,
            weights,
            index,
            total,
        })
    }

    /// Distinct tokens in sorted order
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Total number of tokens in the corpus, duplicates included
    pub fn total_tokens(&self) -> usize {
        self.total
    }

    pub fn index_of(&self, token: &str) -> Option<usize> {
        self.index.get(token).copied()
    }

    pub fn count(&self, token: &str) -> Option<usize> {
        self.index_of(token).map(|i| self.counts[i])
    }

    pub fn frequency(&self, token: &str) -> Option<f64> {
        self.index_of(token).map(|i| self.frequencies[i])
    }

    pub fn weight(&self, token: &str) -> Option<f64> {
        self.index_of(token).map(|i| self.weights[i])
    }

    /// Weight by position in `tokens()`
    pub fn weight_at(&self, index: usize) -> f64 {
        self.weights[index]
    }
}
