//! Pluggable similarity scorers.
//!
//! Every variant scores the anchor texts of a candidate set against the
//! target concept. `None` means "could not be scored" and is never the same
//! as a low score: the selector excludes such candidates from the maximum.

pub mod contextual;
pub mod lexical;
pub mod positional;
pub mod random;
pub mod vector;

use crate::config::{Strategy, TARGET_SENSE};
use crate::error::ScoreError;
use futures::future::BoxFuture;
use philhop_wiki::Candidate;
use std::sync::Arc;

pub use contextual::{ContextualEmbeddingScorer, SimilarityBackend};
pub use lexical::{LexicalGraph, LexicalGraphScorer};
pub use positional::PositionalScorer;
pub use random::RandomScorer;
pub use vector::{EmbeddingTable, OovPolicy, VectorSimilarityScorer};

pub type ScoreResult = Result<Vec<Option<f64>>, ScoreError>;

/// Capability shared by every link-selection strategy.
pub trait Scorer: Send + Sync {
    fn strategy(&self) -> Strategy;

    /// Score each candidate, returning one entry per candidate in order.
    fn score<'a>(
        &'a self,
        target: &'a str,
        candidates: &'a [Candidate],
        context: Option<&'a str>,
    ) -> BoxFuture<'a, ScoreResult>;

    /// Whether revisiting a page is evidence of a loop for this strategy.
    fn detects_cycles(&self) -> bool {
        true
    }

    /// Whether `score` needs the source page's body text as context.
    fn needs_context(&self) -> bool {
        false
    }

    /// Turn a page's body text into the context passed to `score`.
    fn prepare_context(&self, body_text: &str, _candidates: &[Candidate]) -> String {
        body_text.to_string()
    }
}

/// Scorers that work word by word. Multi-word anchors are split on
/// whitespace and the defined token scores are averaged.
pub trait PhraseScorer {
    fn score_token(&self, target: &str, token: &str) -> Option<f64>;

    fn score_phrase(&self, target: &str, phrase: &str) -> Option<f64> {
        mean_defined(tokens(phrase).map(|token| self.score_token(target, &token)))
    }
}

/// Lowercased whitespace-separated tokens of an anchor text.
pub fn tokens(phrase: &str) -> impl Iterator<Item = String> + '_ {
    phrase.split_whitespace().map(|token| token.to_lowercase())
}

/// Arithmetic mean of the defined values, `None` when there are none.
pub fn mean_defined(values: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    (count > 0).then(|| sum / count as f64)
}

pub(crate) fn score_phrases<S: PhraseScorer + ?Sized>(
    scorer: &S,
    target: &str,
    candidates: &[Candidate],
) -> Vec<Option<f64>> {
    candidates
        .iter()
        .map(|candidate| scorer.score_phrase(target, &candidate.anchor_text))
        .collect()
}

/// Shared read-only resources handed to scorers when they are built.
#[derive(Clone)]
pub struct ScorerAssets {
    pub lexical_graph: Option<Arc<LexicalGraph>>,
    pub target_sense: String,
    pub embeddings: Option<Arc<EmbeddingTable>>,
    pub oov_policy: OovPolicy,
    pub backend: Option<SimilarityBackend>,
    pub seed: Option<u64>,
}

impl Default for ScorerAssets {
    fn default() -> Self {
        Self {
            lexical_graph: None,
            target_sense: TARGET_SENSE.to_string(),
            embeddings: None,
            oov_policy: OovPolicy::Skip,
            backend: None,
            seed: None,
        }
    }
}

/// Build the scorer for a strategy from the loaded assets.
pub fn build_scorer(strategy: Strategy, assets: &ScorerAssets) -> Result<Arc<dyn Scorer>, ScoreError> {
    let scorer: Arc<dyn Scorer> = match strategy {
        Strategy::Random => Arc::new(RandomScorer::new(assets.seed)),
        Strategy::NthLink(n) => Arc::new(PositionalScorer::new(n)),
        Strategy::Wordnet => {
            let graph = assets
                .lexical_graph
                .clone()
                .ok_or_else(|| ScoreError::MissingAsset(strategy.tag(), "a lexical graph"))?;
            Arc::new(LexicalGraphScorer::new(graph, &assets.target_sense)?)
        }
        Strategy::Word2vec => {
            let table = assets
                .embeddings
                .clone()
                .ok_or_else(|| ScoreError::MissingAsset(strategy.tag(), "an embedding table"))?;
            Arc::new(VectorSimilarityScorer::new(table, assets.oov_policy))
        }
        Strategy::Bert => {
            let backend = assets
                .backend
                .clone()
                .ok_or_else(|| ScoreError::MissingAsset(strategy.tag(), "a similarity backend"))?;
            Arc::new(ContextualEmbeddingScorer::new(backend))
        }
    };
    Ok(scorer)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LengthScorer;

    impl PhraseScorer for LengthScorer {
        fn score_token(&self, _target: &str, token: &str) -> Option<f64> {
            (token != "unknown").then(|| token.len() as f64)
        }
    }

    #[test]
    fn test_mean_defined() {
        assert_eq!(mean_defined([Some(1.0), None, Some(3.0)]), Some(2.0));
        assert_eq!(mean_defined([None, None]), None);
        assert_eq!(mean_defined([Some(0.0)]), Some(0.0));
        assert_eq!(mean_defined(std::iter::empty()), None);
        assert_eq!(mean_defined([Some(f64::NAN), Some(4.0)]), Some(4.0));
    }

    #[test]
    fn test_phrase_splitting_averages_defined_tokens() {
        let scorer = LengthScorer;
        assert_eq!(scorer.score_phrase("t", "ab  abcd"), Some(3.0));
        assert_eq!(scorer.score_phrase("t", "ab unknown"), Some(2.0));
        assert_eq!(scorer.score_phrase("t", "unknown"), None);
        assert_eq!(scorer.score_phrase("t", "   "), None);
    }

    #[test]
    fn test_tokens_are_lowercased() {
        let collected: Vec<String> = tokens("Ancient  GREEK").collect();
        assert_eq!(collected, vec!["ancient", "greek"]);
    }

    #[test]
    fn test_build_scorer_requires_assets() {
        let assets = ScorerAssets::default();
        assert!(matches!(
            build_scorer(Strategy::Wordnet, &assets),
            Err(ScoreError::MissingAsset(_, _))
        ));
        assert!(matches!(
            build_scorer(Strategy::Word2vec, &assets),
            Err(ScoreError::MissingAsset(_, _))
        ));
        assert!(matches!(
            build_scorer(Strategy::Bert, &assets),
            Err(ScoreError::MissingAsset(_, _))
        ));

        let random = build_scorer(Strategy::Random, &assets).unwrap();
        assert_eq!(random.strategy(), Strategy::Random);
        assert!(!random.detects_cycles());

        let nth = build_scorer(Strategy::NthLink(1), &assets).unwrap();
        assert_eq!(nth.strategy(), Strategy::NthLink(1));
        assert!(nth.detects_cycles());
    }
}
