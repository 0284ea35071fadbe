//! In-memory BM25 (Okapi) keyword index
//!
//! Built per query over a small candidate set, so everything lives in plain
//! maps and is discarded after scoring.

use opensynthesis_common::models::{Chunk, RetrievalMethod, ScoredChunk};
use std::cmp::Ordering;
use std::collections::HashMap;

/// BM25 Okapi parameters
#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    /// Term-frequency saturation
    pub k1: f64,
    /// Length normalisation
    pub b: f64,
    /// Floor for negative IDF, as a fraction of the mean IDF
    pub epsilon: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            epsilon: 0.25,
        }
    }
}

/// Lowercase and split on whitespace
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

pub struct Bm25Index {
    chunks: Vec<Chunk>,
    term_freqs: Vec<HashMap<String, usize>>,
    doc_lens: Vec<usize>,
    avg_doc_len: f64,
    idf: HashMap<String, f64>,
    params: Bm25Params,
}

impl Bm25Index {
    pub fn build(chunks: Vec<Chunk>) -> Self {
        Self::with_params(chunks, Bm25Params::default())
    }

    pub fn with_params(chunks: Vec<Chunk>, params: Bm25Params) -> Self {
        let mut term_freqs = Vec::with_capacity(chunks.len());
        let mut doc_lens = Vec::with_capacity(chunks.len());
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for chunk in &chunks {
            let tokens = tokenize(&chunk.text);
            doc_lens.push(tokens.len());

            let mut tf: HashMap<String, usize> = HashMap::new();
            for token in tokens {
                *tf.entry(token).or_insert(0) += 1;
            }
            for term in tf.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            term_freqs.push(tf);
        }

        let n = chunks.len() as f64;
        let total_len: usize = doc_lens.iter().sum();
        let avg_doc_len = if chunks.is_empty() {
            0.0
        } else {
            total_len as f64 / n
        };

        let mut idf: HashMap<String, f64> = doc_freq
            .into_iter()
            .map(|(term, df)| {
                let df = df as f64;
                (term, ((n - df + 0.5) / (df + 0.5)).ln())
            })
            .collect();

        // Terms in more than half the documents get a small positive weight
        if !idf.is_empty() {
            let mean_idf = idf.values().sum::<f64>() / idf.len() as f64;
            let floor = params.epsilon * mean_idf;
            for value in idf.values_mut() {
                if *value < 0.0 {
                    *value = floor;
                }
            }
        }

        Self {
            chunks,
            term_freqs,
            doc_lens,
            avg_doc_len,
            idf,
            params,
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Score `query` against every indexed chunk; aligned with insertion order
    pub fn score(&self, query: &str) -> Vec<f64> {
        let query_terms = tokenize(query);
        let Bm25Params { k1, b, .. } = self.params;
        let avg = if self.avg_doc_len > 0.0 { self.avg_doc_len } else { 1.0 };

        self.term_freqs
            .iter()
            .zip(&self.doc_lens)
            .map(|(tf, &len)| {
                let norm = k1 * (1.0 - b + b * len as f64 / avg);
                query_terms
                    .iter()
                    .map(|term| {
                        let freq = tf.get(term).copied().unwrap_or(0) as f64;
                        if freq == 0.0 {
                            return 0.0;
                        }
                        let idf = self.idf.get(term).copied().unwrap_or(0.0);
                        idf * freq * (k1 + 1.0) / (freq + norm)
                    })
                    .sum()
            })
            .collect()
    }

    /// Top `k` chunks by BM25 score, keeping only strictly positive scores
    pub fn search(&self, query: &str, k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<(f64, &Chunk)> = self.score(query).into_iter().zip(&self.chunks).collect();

        // Stable: equal scores keep index order
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .filter(|(score, _)| *score > 0.0)
            .map(|(score, chunk)| ScoredChunk::new(chunk.clone(), score, RetrievalMethod::Sparse))
            .collect()
    }
}
