//! Static word-vector similarity (word2vec text format).

use super::{PhraseScorer, ScoreResult, Scorer, mean_defined, score_phrases, tokens};
use crate::config::Strategy;
use crate::error::AssetError;
use futures::FutureExt;
use futures::future::BoxFuture;
use philhop_wiki::Candidate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// How to treat words missing from the embedding vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OovPolicy {
    /// Missing words are unscorable and skipped when averaging.
    #[default]
    Skip,
    /// Missing words count as similarity 0.0 (legacy behaviour).
    ZeroFill,
}

/// Word → dense vector lookup, keyed by lowercased word.
#[derive(Debug, Default)]
pub struct EmbeddingTable {
    dim: usize,
    index: HashMap<String, usize>,
    vectors: Vec<f32>,
}

impl EmbeddingTable {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let table = Self::parse(&text)?;
        if table.is_empty() {
            return Err(AssetError::Empty(path.display().to_string()));
        }
        info!(
            "Loaded {} embeddings of dimension {} from {}",
            table.len(),
            table.dim,
            path.display()
        );
        Ok(table)
    }

    /// Parse `word v1 v2 ... vN` lines, with an optional `count dim` header.
    pub fn parse(text: &str) -> Result<Self, AssetError> {
        let mut table = EmbeddingTable::default();

        for (i, line) in text.lines().enumerate() {
            let line_no = i + 1;
            let mut fields = line.split_whitespace();
            let Some(word) = fields.next() else {
                continue;
            };
            let values: Vec<&str> = fields.collect();

            if line_no == 1 && is_header(word, &values) {
                continue;
            }

            let vector = values
                .iter()
                .map(|v| v.parse::<f32>())
                .collect::<Result<Vec<f32>, _>>()
                .map_err(|e| AssetError::Parse {
                    line: line_no,
                    message: format!("bad component for {}: {}", word, e),
                })?;

            if vector.is_empty() {
                return Err(AssetError::Parse {
                    line: line_no,
                    message: format!("no components for {}", word),
                });
            }
            if table.dim == 0 {
                table.dim = vector.len();
            } else if vector.len() != table.dim {
                return Err(AssetError::DimensionMismatch {
                    line: line_no,
                    expected: table.dim,
                    got: vector.len(),
                });
            }

            // First occurrence wins for case-folded duplicates.
            let key = word.to_lowercase();
            if !table.index.contains_key(&key) {
                table.index.insert(key, table.index.len());
                table.vectors.extend_from_slice(&vector);
            }
        }

        Ok(table)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn vector(&self, word: &str) -> Option<&[f32]> {
        let row = *self.index.get(&word.to_lowercase())?;
        let start = row * self.dim;
        self.vectors.get(start..start + self.dim)
    }

    pub fn contains(&self, word: &str) -> bool {
        self.index.contains_key(&word.to_lowercase())
    }

    /// Cosine similarity, `None` when either word is missing or zero-norm.
    pub fn similarity(&self, a: &str, b: &str) -> Option<f64> {
        cosine_similarity(self.vector(a)?, self.vector(b)?)
    }
}

fn is_header(first: &str, rest: &[&str]) -> bool {
    rest.len() == 1 && first.parse::<usize>().is_ok() && rest[0].parse::<usize>().is_ok()
}

/// Cosine similarity in `[-1, 1]`, `None` for mismatched or zero-norm input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b).fold((0.0f64, 0.0f64, 0.0f64), |(dot, na, nb), (&x, &y)| {
        let (x, y) = (x as f64, y as f64);
        (dot + x * y, na + x * x, nb + y * y)
    });

    let norm = (norm_a * norm_b).sqrt();
    if norm == 0.0 {
        return None;
    }
    Some(dot / norm)
}

pub struct VectorSimilarityScorer {
    table: Arc<EmbeddingTable>,
    oov_policy: OovPolicy,
}

impl VectorSimilarityScorer {
    pub fn new(table: Arc<EmbeddingTable>, oov_policy: OovPolicy) -> Self {
        Self { table, oov_policy }
    }

    pub fn oov_policy(&self) -> OovPolicy {
        self.oov_policy
    }
}

impl PhraseScorer for VectorSimilarityScorer {
    fn score_token(&self, target: &str, token: &str) -> Option<f64> {
        self.table.similarity(target, token)
    }

    fn score_phrase(&self, target: &str, phrase: &str) -> Option<f64> {
        match self.oov_policy {
            OovPolicy::Skip => mean_defined(tokens(phrase).map(|t| self.score_token(target, &t))),
            OovPolicy::ZeroFill => {
                let scores: Vec<f64> = tokens(phrase)
                    .map(|t| self.score_token(target, &t).unwrap_or(0.0))
                    .collect();
                if scores.is_empty() {
                    return None;
                }
                Some(scores.iter().sum::<f64>() / scores.len() as f64)
            }
        }
    }
}

impl Scorer for VectorSimilarityScorer {
    fn strategy(&self) -> Strategy {
        Strategy::Word2vec
    }

    fn score<'a>(
        &'a self,
        target: &'a str,
        candidates: &'a [Candidate],
        _context: Option<&'a str>,
    ) -> BoxFuture<'a, ScoreResult> {
        futures::future::ready(Ok(score_phrases(self, target, candidates))).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
4 3
philosophy 1.0 0.0 0.0
logic 0.8 0.6 0.0
Cheese 0.0 0.0 1.0
void 0.0 0.0 0.0
";

    #[test]
    fn test_parse_with_header() {
        let table = EmbeddingTable::parse(SAMPLE).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.dim(), 3);
        assert!(table.contains("cheese"));
        assert_eq!(table.vector("logic"), Some(&[0.8f32, 0.6, 0.0][..]));
    }

    #[test]
    fn test_parse_without_header() {
        let table = EmbeddingTable::parse("a 1 2\nb 3 4\n").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.dim(), 2);
    }

    #[test]
    fn test_parse_dimension_mismatch() {
        let err = EmbeddingTable::parse("a 1 2\nb 3\n").unwrap_err();
        assert!(matches!(
            err,
            AssetError::DimensionMismatch {
                line: 2,
                expected: 2,
                got: 1
            }
        ));
    }

    #[test]
    fn test_parse_bad_number() {
        let err = EmbeddingTable::parse("a 1 x\n").unwrap_err();
        assert!(matches!(err, AssetError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_cosine_similarity() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), Some(1.0));
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), Some(0.0));
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), Some(-1.0));
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), None);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), None);
    }

    #[test]
    fn test_oov_skip_versus_zero_fill() {
        let table = Arc::new(EmbeddingTable::parse(SAMPLE).unwrap());
        let skip = VectorSimilarityScorer::new(table.clone(), OovPolicy::Skip);
        let zero = VectorSimilarityScorer::new(table, OovPolicy::ZeroFill);

        assert_eq!(skip.score_phrase("philosophy", "unknownword"), None);
        assert_eq!(zero.score_phrase("philosophy", "unknownword"), Some(0.0));

        let logic = cosine_similarity(&[1.0, 0.0, 0.0], &[0.8, 0.6, 0.0]).unwrap();
        let skipped = skip.score_phrase("philosophy", "Logic unknownword").unwrap();
        let filled = zero.score_phrase("philosophy", "Logic unknownword").unwrap();
        assert!((skipped - logic).abs() < 1e-9);
        assert!((filled - logic / 2.0).abs() < 1e-9);

        // Zero-norm vectors are unscorable under Skip.
        assert_eq!(skip.score_phrase("philosophy", "void"), None);
    }
}
