use super::{ScoreResult, Scorer};
use crate::config::Strategy;
use futures::FutureExt;
use futures::future::BoxFuture;
use philhop_wiki::Candidate;

/// Fixed-position baseline: always follows the link at 0-based position `nth`.
///
/// Candidates before `nth` are unscorable; later ones score lower the
/// further they are from it. Once a candidate is eliminated the next
/// position up takes its place.
#[derive(Debug, Clone, Copy)]
pub struct PositionalScorer {
    nth: usize,
}

impl PositionalScorer {
    pub fn new(nth: usize) -> Self {
        Self { nth }
    }

    fn score_ordinal(&self, ordinal: usize) -> Option<f64> {
        ordinal.checked_sub(self.nth).map(|distance| -(distance as f64))
    }
}

impl Scorer for PositionalScorer {
    fn strategy(&self) -> Strategy {
        Strategy::NthLink(self.nth)
    }

    fn score<'a>(
        &'a self,
        _target: &'a str,
        candidates: &'a [Candidate],
        _context: Option<&'a str>,
    ) -> BoxFuture<'a, ScoreResult> {
        let scores = candidates.iter().map(|c| self.score_ordinal(c.ordinal)).collect();
        futures::future::ready(Ok(scores)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_ordinal() {
        let scorer = PositionalScorer::new(1);
        assert_eq!(scorer.score_ordinal(0), None);
        assert_eq!(scorer.score_ordinal(1), Some(-0.0));
        assert_eq!(scorer.score_ordinal(4), Some(-3.0));
    }
}
