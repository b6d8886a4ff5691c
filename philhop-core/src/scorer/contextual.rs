//! Contextual-embedding similarity served by an external HTTP backend.
//!
//! The backend embeds the source page's text, mean-pools the embeddings of
//! each candidate phrase's occurrences and compares them with a reference
//! embedding of the target concept.

use super::{ScoreResult, Scorer};
use crate::config::Strategy;
use crate::error::ScoreError;
use futures::FutureExt;
use futures::future::BoxFuture;
use philhop_wiki::Candidate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Serialize)]
struct SimilarityRequest<'a> {
    #[serde(rename = "words")]
    target_words: &'a [String],
    #[serde(rename = "text")]
    context_text: &'a str,
}

/// Backend reply. `winner == ("", 0.0)` means nothing was scorable.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimilarityResponse {
    pub similarities: Vec<Option<f64>>,
    pub winner: (String, f64),
}

impl SimilarityResponse {
    pub fn has_winner(&self) -> bool {
        !(self.winner.0.is_empty() && self.winner.1 == 0.0)
    }
}

#[derive(Debug, Clone)]
pub struct SimilarityBackend {
    client: Client,
    endpoint: String,
    max_attempts: usize,
}

impl SimilarityBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("philhop/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/similarity", base_url.trim_end_matches('/')),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        })
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Ask the backend for similarities, retrying transport failures,
    /// error statuses and undecodable or `null` bodies.
    pub async fn similarities(&self, words: &[String], text: &str) -> Result<SimilarityResponse, ScoreError> {
        let request = SimilarityRequest {
            target_words: words,
            context_text: text,
        };
        let mut cause = String::new();

        for attempt in 1..=self.max_attempts {
            match self.attempt(&request).await {
                Ok(response) => {
                    debug!("Backend scored {} words on attempt {}", words.len(), attempt);
                    return Ok(response);
                }
                Err(e) => {
                    warn!(
                        "Similarity request to {} failed (attempt {}/{}): {}",
                        self.endpoint, attempt, self.max_attempts, e
                    );
                    cause = e;
                }
            }
        }

        Err(ScoreError::BackendUnavailable {
            attempts: self.max_attempts,
            cause,
        })
    }

    async fn attempt(&self, request: &SimilarityRequest<'_>) -> Result<SimilarityResponse, String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }

        let body: Option<SimilarityResponse> = response.json().await.map_err(|e| e.to_string())?;
        body.ok_or_else(|| "backend returned null".to_string())
    }
}

/// Cut `body_text` before the last occurrence of the last candidate's
/// anchor and put one sentence per line.
pub fn build_context(body_text: &str, candidates: &[Candidate]) -> String {
    let cut = candidates
        .last()
        .and_then(|last| rfind_ignore_ascii_case(body_text, last.anchor_text.trim()))
        .unwrap_or(body_text.len());

    split_sentences(&body_text[..cut]).join("\n")
}

// ASCII folding keeps byte offsets valid in the original string.
fn rfind_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack
        .to_ascii_lowercase()
        .rfind(&needle.to_ascii_lowercase())
}

/// Split prose into trimmed, non-empty sentences.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' {
            push_sentence(&mut sentences, &mut current);
            continue;
        }
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().is_none_or(|next| next.is_whitespace()) {
            push_sentence(&mut sentences, &mut current);
        }
    }
    push_sentence(&mut sentences, &mut current);

    sentences
}

fn push_sentence(sentences: &mut Vec<String>, current: &mut String) {
    let sentence = current.trim();
    if !sentence.is_empty() {
        sentences.push(sentence.to_string());
    }
    current.clear();
}

/// Scores candidates through a [`SimilarityBackend`]. The reference
/// embedding of the target lives on the backend, so the target word passed
/// to `score` is not sent.
pub struct ContextualEmbeddingScorer {
    backend: SimilarityBackend,
}

impl ContextualEmbeddingScorer {
    pub fn new(backend: SimilarityBackend) -> Self {
        Self { backend }
    }
}

impl Scorer for ContextualEmbeddingScorer {
    fn strategy(&self) -> Strategy {
        Strategy::Bert
    }

    fn needs_context(&self) -> bool {
        true
    }

    fn prepare_context(&self, body_text: &str, candidates: &[Candidate]) -> String {
        build_context(body_text, candidates)
    }

    fn score<'a>(
        &'a self,
        _target: &'a str,
        candidates: &'a [Candidate],
        context: Option<&'a str>,
    ) -> BoxFuture<'a, ScoreResult> {
        async move {
            let words: Vec<String> = candidates
                .iter()
                .map(|c| c.anchor_text.trim().to_lowercase())
                .collect();

            let response = self.backend.similarities(&words, context.unwrap_or_default()).await?;

            if response.similarities.len() != words.len() {
                return Err(ScoreError::LengthMismatch {
                    expected: words.len(),
                    got: response.similarities.len(),
                });
            }
            if !response.has_winner() {
                return Err(ScoreError::NoWinner);
            }
            Ok(response.similarities)
        }
        .boxed()
    }
}
