use crate::error::{ScoreError, SelectError};
use crate::scorer::Scorer;
use philhop_wiki::Candidate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// A candidate together with the score it received, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: Option<f64>,
}

/// Result of one selection: the winner and every score behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionOutcome {
    /// Index of the winner in the candidate slice passed to `select`.
    pub chosen_index: usize,
    pub chosen: Candidate,
    pub scores: Vec<ScoredCandidate>,
}

impl SelectionOutcome {
    pub fn chosen_score(&self) -> Option<f64> {
        self.scores.get(self.chosen_index).and_then(|s| s.score)
    }
}

/// Picks the single best outgoing link of a page.
#[derive(Clone)]
pub struct LinkSelector {
    scorer: Arc<dyn Scorer>,
    target: String,
}

impl LinkSelector {
    pub fn new(scorer: Arc<dyn Scorer>, target: impl Into<String>) -> Self {
        Self {
            scorer,
            target: target.into(),
        }
    }

    pub fn scorer(&self) -> &Arc<dyn Scorer> {
        &self.scorer
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Score `candidates` and return the one with the greatest defined
    /// score. Ties go to the lowest ordinal.
    pub async fn select(
        &self,
        candidates: &[Candidate],
        context: Option<&str>,
    ) -> Result<SelectionOutcome, SelectError> {
        if candidates.is_empty() {
            return Err(SelectError::NoCandidates);
        }

        let scores = self.scorer.score(&self.target, candidates, context).await?;
        if scores.len() != candidates.len() {
            return Err(ScoreError::LengthMismatch {
                expected: candidates.len(),
                got: scores.len(),
            }
            .into());
        }

        let chosen_index = best_index(candidates, &scores).ok_or(SelectError::NoScorableCandidate)?;
        let chosen = candidates[chosen_index].clone();
        debug!(
            "Selected '{}' -> {} ({} of {} candidates scored)",
            chosen.anchor_text,
            chosen.destination.id,
            scores.iter().filter(|s| s.is_some()).count(),
            candidates.len()
        );

        let scores = candidates
            .iter()
            .zip(scores)
            .map(|(candidate, score)| ScoredCandidate {
                candidate: candidate.clone(),
                score,
            })
            .collect();

        Ok(SelectionOutcome {
            chosen_index,
            chosen,
            scores,
        })
    }
}

/// Index of the strictly greatest defined score, lowest ordinal on ties.
/// NaN counts as undefined.
pub fn best_index(candidates: &[Candidate], scores: &[Option<f64>]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;

    for (i, (candidate, score)) in candidates.iter().zip(scores).enumerate() {
        let Some(score) = score.filter(|s| !s.is_nan()) else {
            continue;
        };
        let better = match best {
            None => true,
            Some((j, best_score)) => {
                score > best_score || (score == best_score && candidate.ordinal < candidates[j].ordinal)
            }
        };
        if better {
            best = Some((i, score));
        }
    }

    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use philhop_wiki::PageRef;

    fn candidate(ordinal: usize) -> Candidate {
        Candidate::new(PageRef::from_id(format!("/wiki/C{}", ordinal)), format!("c{}", ordinal), ordinal)
    }

    #[test]
    fn test_best_index_strict_maximum() {
        let c: Vec<_> = (0..3).map(candidate).collect();
        assert_eq!(best_index(&c, &[Some(0.1), Some(0.9), Some(0.5)]), Some(1));
    }

    #[test]
    fn test_best_index_tie_prefers_lowest_ordinal() {
        let c = vec![candidate(2), candidate(0), candidate(1)];
        assert_eq!(best_index(&c, &[Some(0.5), Some(0.5), Some(0.5)]), Some(1));
    }

    #[test]
    fn test_best_index_absent_is_not_zero() {
        let c: Vec<_> = (0..3).map(candidate).collect();
        assert_eq!(best_index(&c, &[None, Some(0.0), None]), Some(1));
        assert_eq!(best_index(&c, &[None, Some(-1.0), Some(f64::NAN)]), Some(1));
        assert_eq!(best_index(&c, &[None, None, None]), None);
    }
}
