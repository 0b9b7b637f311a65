//! Subword skip-gram model
//!
//! Skip-gram with negative sampling where every word is represented by its
//! own row plus the rows of its hashed character n-grams. Tokens outside
//! the training vocabulary are composed from n-grams alone.

use std::collections::{BTreeMap, HashMap};

use fastrand::Rng;

use super::{TrainingParams, WordEmbeddingModel};
use crate::error::{EmbeddingError, Result};

const NEGATIVE_TABLE_SIZE: usize = 100_000;
const MIN_LEARNING_RATE_RATIO: f32 = 1e-4;

/// Trained subword skip-gram model
pub struct SubwordModel {
    dimension: usize,
    min_n: usize,
    max_n: usize,
    buckets: usize,
    /// Trained vocabulary: word -> row in `input`
    words: HashMap<String, usize>,
    /// Input rows: one per vocabulary word, then one per bucket
    input: Vec<f32>,
}

impl SubwordModel {
    /// Train on a tokenized corpus
    ///
    /// Training is single-threaded and fully determined by `params.seed`
    /// and the corpus.
    pub fn train(corpus: &[Vec<String>], params: &TrainingParams) -> Result<Self> {
        validate(params)?;

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for sentence in corpus {
            for token in sentence {
                *counts.entry(token.as_str()).or_insert(0) += 1;
            }
        }
        if counts.is_empty() {
            return Err(EmbeddingError::training(
                "corpus",
                "cannot train a word model on an empty corpus",
            ));
        }

        let vocab: Vec<(&str, usize)> = counts
            .into_iter()
            .filter(|(_, count)| *count >= params.min_count)
            .collect();
        let words: HashMap<String, usize> = vocab
            .iter()
            .enumerate()
            .map(|(row, (word, _))| (word.to_string(), row))
            .collect();

        let dim = params.dimension;
        let nwords = vocab.len();
        let mut rng = Rng::with_seed(params.seed);

        let bound = 1.0 / dim as f32;
        let mut input: Vec<f32> = (0..(nwords + params.buckets) * dim)
            .map(|_| (rng.f32() * 2.0 - 1.0) * bound)
            .collect();
        let mut output = vec![0.0_f32; nwords * dim];

        let subwords: Vec<Vec<usize>> = vocab
            .iter()
            .enumerate()
            .map(|(row, (word, _))| {
                let mut ids = vec![row];
                ids.extend(
                    ngram_buckets(word, params.min_n, params.max_n, params.buckets)
                        .map(|bucket| nwords + bucket),
                );
                ids
            })
            .collect();

        let negatives = negative_table(&vocab);

        let sentences: Vec<Vec<usize>> = corpus
            .iter()
            .map(|sentence| {
                sentence
                    .iter()
                    .filter_map(|token| words.get(token.as_str()).copied())
                    .collect()
            })
            .collect();

        let total_words = sentences.iter().map(Vec::len).sum::<usize>() * params.epochs;
        let mut processed = 0_usize;
        let mut since_update = 0_usize;
        let mut learning_rate = params.learning_rate;

        let mut hidden = vec![0.0_f32; dim];
        let mut grad = vec![0.0_f32; dim];

        for epoch in 0..params.epochs {
            for sentence in &sentences {
                for (pos, &center) in sentence.iter().enumerate() {
                    let reach = rng.usize(1..=params.window);
                    let start = pos.saturating_sub(reach);
                    let end = (pos + reach).min(sentence.len() - 1);

                    for (ctx_pos, &target) in sentence.iter().enumerate().take(end + 1).skip(start) {
                        if ctx_pos == pos {
                            continue;
                        }
                        let inputs = &subwords[center];
                        mean_rows(&input, inputs, dim, &mut hidden);
                        grad.iter_mut().for_each(|g| *g = 0.0);

                        update_output(&mut output, target, 1.0, &hidden, &mut grad, dim, learning_rate);
                        for _ in 0..params.negative {
                            let negative = negatives[rng.usize(0..negatives.len())];
                            if negative != target {
                                update_output(
                                    &mut output,
                                    negative,
                                    0.0,
                                    &hidden,
                                    &mut grad,
                                    dim,
                                    learning_rate,
                                );
                            }
                        }

                        for &id in inputs {
                            let row = &mut input[id * dim..(id + 1) * dim];
                            row.iter_mut().zip(grad.iter()).for_each(|(w, g)| *w += g);
                        }
                    }

                    processed += 1;
                    since_update += 1;
                    if since_update >= params.batch_size {
                        since_update = 0;
                        let progress = processed as f32 / total_words as f32;
                        learning_rate = (params.learning_rate * (1.0 - progress))
                            .max(params.learning_rate * MIN_LEARNING_RATE_RATIO);
                    }
                }
            }
            log::debug!(
                "epoch {}/{} done ({} words, lr {:.6})",
                epoch + 1,
                params.epochs,
                processed,
                learning_rate
            );
        }

        Ok(Self {
            dimension: dim,
            min_n: params.min_n,
            max_n: params.max_n,
            buckets: params.buckets,
            words,
            input,
        })
    }

    /// Number of words with their own row
    pub fn vocabulary_size(&self) -> usize {
        self.words.len()
    }

    /// Whether the word was in the training vocabulary
    pub fn contains(&self, word: &str) -> bool {
        self.words.contains_key(word)
    }

    fn rows_of(&self, word: &str) -> Vec<usize> {
        let nwords = self.words.len();
        let mut ids: Vec<usize> = self.words.get(word).copied().into_iter().collect();
        ids.extend(ngram_buckets(word, self.min_n, self.max_n, self.buckets).map(|b| nwords + b));
        ids
    }
}

impl WordEmbeddingModel for SubwordModel {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn vector_of(&self, word: &str) -> Result<Vec<f32>> {
        let ids = self.rows_of(word);
        if ids.is_empty() {
            return Err(EmbeddingError::UnknownWord(word.to_string()));
        }
        let mut vector = vec![0.0_f32; self.dimension];
        mean_rows(&self.input, &ids, self.dimension, &mut vector);
        Ok(vector)
    }
}

fn validate(params: &TrainingParams) -> Result<()> {
    if params.dimension == 0 || params.window == 0 || params.batch_size == 0 {
        return Err(EmbeddingError::configuration(
            "dimension, window and batch_size must be greater than 0",
        ));
    }
    if params.min_n == 0 || params.min_n > params.max_n || params.buckets == 0 {
        return Err(EmbeddingError::configuration(format!(
            "invalid n-gram settings: min_n={}, max_n={}, buckets={}",
            params.min_n, params.max_n, params.buckets
        )));
    }
    Ok(())
}

/// Average of the selected rows of a flat row-major matrix
fn mean_rows(matrix: &[f32], ids: &[usize], dim: usize, out: &mut [f32]) {
    out.iter_mut().for_each(|v| *v = 0.0);
    for &id in ids {
        let row = &matrix[id * dim..(id + 1) * dim];
        out.iter_mut().zip(row.iter()).for_each(|(o, r)| *o += r);
    }
    let scale = 1.0 / ids.len() as f32;
    out.iter_mut().for_each(|v| *v *= scale);
}

/// One logistic step against an output row; accumulates the input gradient
fn update_output(
    output: &mut [f32],
    target: usize,
    label: f32,
    hidden: &[f32],
    grad: &mut [f32],
    dim: usize,
    learning_rate: f32,
) {
    let row = &mut output[target * dim..(target + 1) * dim];
    let score: f32 = row.iter().zip(hidden.iter()).map(|(w, h)| w * h).sum();
    let alpha = learning_rate * (label - sigmoid(score));
    for ((w, h), g) in row.iter_mut().zip(hidden.iter()).zip(grad.iter_mut()) {
        *g += alpha * *w;
        *w += alpha * h;
    }
}

fn sigmoid(x: f32) -> f32 {
    if x > 8.0 {
        1.0
    } else if x < -8.0 {
        0.0
    } else {
        1.0 / (1.0 + (-x).exp())
    }
}

/// Unigram^0.75 sampling table over vocabulary rows
fn negative_table(vocab: &[(&str, usize)]) -> Vec<usize> {
    let weights: Vec<f64> = vocab.iter().map(|(_, c)| (*c as f64).powf(0.75)).collect();
    let total: f64 = weights.iter().sum();
    let mut table = Vec::with_capacity(NEGATIVE_TABLE_SIZE + vocab.len());
    for (row, weight) in weights.iter().enumerate() {
        let slots = ((weight / total) * NEGATIVE_TABLE_SIZE as f64).ceil() as usize;
        table.extend(std::iter::repeat(row).take(slots.max(1)));
    }
    table
}

/// Bucket ids of the `<word>` character n-grams
fn ngram_buckets(
    word: &str,
    min_n: usize,
    max_n: usize,
    buckets: usize,
) -> impl Iterator<Item = usize> {
    let chars: Vec<char> = std::iter::once('<')
        .chain(word.chars())
        .chain(std::iter::once('>'))
        .collect();
    let len = chars.len();
    let mut ids = Vec::new();
    for start in 0..len {
        for n in min_n..=max_n {
            if start + n > len {
                break;
            }
            let gram: String = chars[start..start + n].iter().collect();
            ids.push(fnv1a(gram.as_bytes()) as usize % buckets);
        }
    }
    ids.into_iter()
}

fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 2_166_136_261;
    for &byte in bytes {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16_777_619);
    }
    hash
}
