//! Lexical-graph (WordNet-style) path similarity.
//!
//! The graph is loaded from a TSV export with one sense per line:
//!
//! ```text
//! sense_id<TAB>lemma,lemma,...<TAB>hypernym_id,hypernym_id,...
//! ```
//!
//! Similarity between two senses is `1 / (1 + d)` where `d` is the number
//! of edges on the shortest path through the hypernym hierarchy.

use super::{PhraseScorer, ScoreResult, Scorer, mean_defined, score_phrases};
use crate::config::Strategy;
use crate::error::{AssetError, ScoreError};
use futures::FutureExt;
use futures::future::BoxFuture;
use petgraph::algo::dijkstra;
use petgraph::graph::{NodeIndex, UnGraph};
use philhop_wiki::Candidate;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct LexicalGraph {
    graph: UnGraph<String, ()>,
    senses: HashMap<String, NodeIndex>,
    lemmas: HashMap<String, Vec<NodeIndex>>,
}

impl LexicalGraph {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let graph = Self::parse(&text)?;
        if graph.is_empty() {
            return Err(AssetError::Empty(path.display().to_string()));
        }
        info!(
            "Loaded lexical graph from {} ({} senses, {} edges)",
            path.display(),
            graph.len(),
            graph.graph.edge_count()
        );
        Ok(graph)
    }

    pub fn parse(text: &str) -> Result<Self, AssetError> {
        let mut lexicon = LexicalGraph::default();
        let mut pending_edges = Vec::new();

        for (i, line) in text.lines().enumerate() {
            let line_no = i + 1;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split('\t');
            let sense_id = fields.next().unwrap_or_default().trim();
            let lemmas = fields.next().ok_or_else(|| AssetError::Parse {
                line: line_no,
                message: "expected at least two tab-separated fields".to_string(),
            })?;
            let hypernyms = fields.next().unwrap_or_default();

            if sense_id.is_empty() {
                return Err(AssetError::Parse {
                    line: line_no,
                    message: "empty sense id".to_string(),
                });
            }
            if lexicon.senses.contains_key(sense_id) {
                return Err(AssetError::Parse {
                    line: line_no,
                    message: format!("duplicate sense id {}", sense_id),
                });
            }

            let node = lexicon.graph.add_node(sense_id.to_string());
            lexicon.senses.insert(sense_id.to_string(), node);

            for lemma in split_list(lemmas) {
                lexicon.lemmas.entry(lemma.to_lowercase()).or_default().push(node);
            }
            for hypernym in split_list(hypernyms) {
                pending_edges.push((line_no, node, hypernym.to_string()));
            }
        }

        // Hypernyms may be declared after the senses that point to them.
        for (line, node, hypernym) in pending_edges {
            let parent = *lexicon.senses.get(&hypernym).ok_or_else(|| AssetError::Parse {
                line,
                message: format!("unknown hypernym {}", hypernym),
            })?;
            lexicon.graph.update_edge(node, parent, ());
        }

        Ok(lexicon)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn sense(&self, sense_id: &str) -> Option<NodeIndex> {
        self.senses.get(sense_id).copied()
    }

    /// All senses of a lemma, in declaration order.
    pub fn senses_of(&self, lemma: &str) -> &[NodeIndex] {
        self.lemmas
            .get(&lemma.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Shortest hop distance from `from` to every reachable sense.
    pub fn distances_from(&self, from: NodeIndex) -> HashMap<NodeIndex, usize> {
        dijkstra(&self.graph, from, None, |_| 1usize)
            .into_iter()
            .collect()
    }

    /// Path similarity between two senses, `None` when they are unconnected.
    pub fn path_similarity(&self, a: &str, b: &str) -> Option<f64> {
        let a = self.sense(a)?;
        let b = self.sense(b)?;
        let distances = dijkstra(&self.graph, a, Some(b), |_| 1usize);
        distances.get(&b).map(|d| similarity(*d))
    }
}

fn split_list(field: &str) -> impl Iterator<Item = &str> {
    field.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn similarity(distance: usize) -> f64 {
    1.0 / (1.0 + distance as f64)
}

/// Scores anchors by their path similarity to a fixed target sense.
///
/// A word's score is the mean over all its senses that are connected to
/// the target; a word with no connected sense is unscorable.
pub struct LexicalGraphScorer {
    graph: Arc<LexicalGraph>,
    target_sense: String,
    distances: HashMap<NodeIndex, usize>,
}

impl LexicalGraphScorer {
    pub fn new(graph: Arc<LexicalGraph>, target_sense: &str) -> Result<Self, ScoreError> {
        let target = graph
            .sense(target_sense)
            .ok_or_else(|| ScoreError::UnknownTargetSense(target_sense.to_string()))?;
        let distances = graph.distances_from(target);
        debug!(
            "Target sense {} reaches {} of {} senses",
            target_sense,
            distances.len(),
            graph.len()
        );

        Ok(Self {
            graph,
            target_sense: target_sense.to_string(),
            distances,
        })
    }

    pub fn target_sense(&self) -> &str {
        &self.target_sense
    }
}

impl PhraseScorer for LexicalGraphScorer {
    // The target sense is bound at construction; the target word is unused.
    fn score_token(&self, _target: &str, token: &str) -> Option<f64> {
        mean_defined(
            self.graph
                .senses_of(token)
                .iter()
                .map(|sense| self.distances.get(sense).map(|d| similarity(*d))),
        )
    }
}

impl Scorer for LexicalGraphScorer {
    fn strategy(&self) -> Strategy {
        Strategy::Wordnet
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
# id\tlemmas\thypernyms
entity.n.01\tentity\t
abstraction.n.06\tabstraction\tentity.n.01
discipline.n.01\tdiscipline,field\tknowledge.n.01
knowledge.n.01\tknowledge\tabstraction.n.06
philosophy.n.02\tphilosophy\tdiscipline.n.01
philosophy.n.03\tphilosophy,doctrine\tknowledge.n.01
science.n.01\tscience\tdiscipline.n.01
island.n.01\tisland\t
";

    #[test]
    fn test_parse_graph() {
        let graph = LexicalGraph::parse(SAMPLE).unwrap();
        assert_eq!(graph.len(), 8);
        assert_eq!(graph.senses_of("philosophy").len(), 2);
        assert_eq!(graph.senses_of("Field").len(), 1);
        assert!(graph.senses_of("cheese").is_empty());
    }

    #[test]
    fn test_parse_rejects_unknown_hypernym() {
        let err = LexicalGraph::parse("a.n.01\ta\tmissing.n.01\n").unwrap_err();
        assert!(matches!(err, AssetError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_parse_rejects_single_field() {
        let err = LexicalGraph::parse("a.n.01\n").unwrap_err();
        assert!(matches!(err, AssetError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_path_similarity() {
        let graph = LexicalGraph::parse(SAMPLE).unwrap();
        assert_eq!(graph.path_similarity("philosophy.n.02", "philosophy.n.02"), Some(1.0));
        assert_eq!(graph.path_similarity("philosophy.n.02", "discipline.n.01"), Some(0.5));
        assert_eq!(graph.path_similarity("philosophy.n.02", "science.n.01"), Some(1.0 / 3.0));
        assert_eq!(graph.path_similarity("philosophy.n.02", "island.n.01"), None);
    }

    #[test]
    fn test_scorer_unknown_target_sense() {
        let graph = Arc::new(LexicalGraph::parse(SAMPLE).unwrap());
        assert!(matches!(
            LexicalGraphScorer::new(graph, "nothing.n.01"),
            Err(ScoreError::UnknownTargetSense(_))
        ));
    }

    #[test]
    fn test_scorer_averages_over_senses() {
        let graph = Arc::new(LexicalGraph::parse(SAMPLE).unwrap());
        let scorer = LexicalGraphScorer::new(graph, "philosophy.n.02").unwrap();

        // philosophy.n.02 at distance 0, philosophy.n.03 at distance 3.
        let expected = (1.0 + 0.25) / 2.0;
        assert_eq!(scorer.score_token("philosophy", "philosophy"), Some(expected));
        assert_eq!(scorer.score_token("philosophy", "island"), None);
        assert_eq!(scorer.score_token("philosophy", "cheese"), None);

        // Unscorable tokens are skipped in a phrase.
        assert_eq!(scorer.score_phrase("philosophy", "science island"), Some(1.0 / 3.0));
    }
}
