use philhop_wiki::PageRef;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_MAX_HOPS: usize = 100;
pub const DEFAULT_N_LINKS: usize = 20;
pub const TARGET_PAGE_ID: &str = "/wiki/Philosophy";
pub const TARGET_PAGE_TITLE: &str = "Philosophy";
pub const TARGET_WORD: &str = "philosophy";
pub const TARGET_SENSE: &str = "philosophy.n.02";

/// What to hand back when the hop budget runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HopLimitPolicy {
    /// Return the partial path as best-effort data.
    ReturnPartial,
    /// Treat an exhausted budget like any other failure.
    Fail,
}

/// Options for a single traversal.
#[derive(Debug, Clone)]
pub struct HopConfig {
    pub max_hops: usize,
    pub n_links: usize,
    pub target_page: PageRef,
    pub target_word: String,
    pub hop_limit_policy: HopLimitPolicy,
    pub deadline: Option<Duration>,
}

impl Default for HopConfig {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
            n_links: DEFAULT_N_LINKS,
            target_page: PageRef::new(TARGET_PAGE_ID, TARGET_PAGE_TITLE),
            target_word: TARGET_WORD.to_string(),
            hop_limit_policy: HopLimitPolicy::ReturnPartial,
            deadline: None,
        }
    }
}

impl HopConfig {
    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    pub fn with_n_links(mut self, n_links: usize) -> Self {
        self.n_links = n_links;
        self
    }

    pub fn with_target(mut self, page: PageRef, word: impl Into<String>) -> Self {
        self.target_page = page;
        self.target_word = word.into();
        self
    }

    pub fn with_hop_limit_policy(mut self, policy: HopLimitPolicy) -> Self {
        self.hop_limit_policy = policy;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Link-selection strategy, chosen once at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    Random,
    /// Always follow the link at this 0-based position.
    NthLink(usize),
    Wordnet,
    Word2vec,
    Bert,
}

impl Strategy {
    /// Stable tag written to traversal records.
    pub fn tag(&self) -> String {
        match self {
            Strategy::Random => "RANDOM".to_string(),
            Strategy::NthLink(n) => format!("NTH_LINK({})", n + 1),
            Strategy::Wordnet => "WORDNET".to_string(),
            Strategy::Word2vec => "EMBEDDING_WORD2VEC".to_string(),
            Strategy::Bert => "EMBEDDING_BERT".to_string(),
        }
    }

    /// Parse a CLI name: `random`, `nth-link[:N]` (N is 1-based), `wordnet`,
    /// `word2vec`, `bert`.
    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "random" => Some(Strategy::Random),
            "wordnet" => Some(Strategy::Wordnet),
            "word2vec" | "embedding-word2vec" => Some(Strategy::Word2vec),
            "bert" | "embedding-bert" => Some(Strategy::Bert),
            "nth-link" => Some(Strategy::NthLink(1)),
            other => {
                let n = other.strip_prefix("nth-link:")?.parse::<usize>().ok()?;
                (n >= 1).then(|| Strategy::NthLink(n - 1))
            }
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_from_str() {
        assert_eq!(Strategy::from_str("random"), Some(Strategy::Random));
        assert_eq!(Strategy::from_str("WordNet"), Some(Strategy::Wordnet));
        assert_eq!(Strategy::from_str("word2vec"), Some(Strategy::Word2vec));
        assert_eq!(Strategy::from_str("bert"), Some(Strategy::Bert));
        assert_eq!(Strategy::from_str("nth-link"), Some(Strategy::NthLink(1)));
        assert_eq!(Strategy::from_str("nth-link:1"), Some(Strategy::NthLink(0)));
        assert_eq!(Strategy::from_str("nth-link:0"), None);
        assert_eq!(Strategy::from_str("glove"), None);
    }

    #[test]
    fn test_strategy_tags() {
        assert_eq!(Strategy::NthLink(1).tag(), "NTH_LINK(2)");
        assert_eq!(Strategy::Word2vec.tag(), "EMBEDDING_WORD2VEC");
        assert_eq!(Strategy::Bert.to_string(), "EMBEDDING_BERT");
    }

    #[test]
    fn test_default_config() {
        let config = HopConfig::default();
        assert_eq!(config.max_hops, 100);
        assert_eq!(config.n_links, 20);
        assert_eq!(config.target_page.id, "/wiki/Philosophy");
        assert_eq!(config.hop_limit_policy, HopLimitPolicy::ReturnPartial);
        assert!(config.deadline.is_none());
    }
}
