use super::{ScoreResult, Scorer};
use crate::config::Strategy;
use futures::FutureExt;
use futures::future::BoxFuture;
use philhop_wiki::Candidate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Uniform-random baseline. Revisits are expected, so it opts out of
/// cycle detection.
pub struct RandomScorer {
    rng: Mutex<StdRng>,
}

impl RandomScorer {
    /// Seeded scorers replay the same choices for the same inputs.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng: Mutex::new(rng) }
    }
}

impl Scorer for RandomScorer {
    fn strategy(&self) -> Strategy {
        Strategy::Random
    }

    fn detects_cycles(&self) -> bool {
        false
    }

    fn score<'a>(
        &'a self,
        _target: &'a str,
        candidates: &'a [Candidate],
        _context: Option<&'a str>,
    ) -> BoxFuture<'a, ScoreResult> {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let scores = candidates.iter().map(|_| Some(rng.r#gen::<f64>())).collect();
        futures::future::ready(Ok(scores)).boxed()
    }
}
