//! Hop engine: follow one selected link per page until the target is
//! reached, the budget runs out, or the walk starts looping.

use crate::cancel::CancellationToken;
use crate::config::{HopConfig, HopLimitPolicy, Strategy};
use crate::error::{ScoreError, SelectError};
use crate::scorer::Scorer;
use crate::selector::{LinkSelector, SelectionOutcome};
use philhop_wiki::{Candidate, LinkSource, PageRef};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a traversal stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    ReachedTarget,
    CycleTerminated,
    ExtractionFailed,
    SelectionFailed,
    BackendUnavailable,
    HopLimitExceeded,
    Cancelled,
}

impl TerminalReason {
    pub const ALL: [TerminalReason; 7] = [
        TerminalReason::ReachedTarget,
        TerminalReason::CycleTerminated,
        TerminalReason::ExtractionFailed,
        TerminalReason::SelectionFailed,
        TerminalReason::BackendUnavailable,
        TerminalReason::HopLimitExceeded,
        TerminalReason::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalReason::ReachedTarget => "reached_target",
            TerminalReason::CycleTerminated => "cycle_terminated",
            TerminalReason::ExtractionFailed => "extraction_failed",
            TerminalReason::SelectionFailed => "selection_failed",
            TerminalReason::BackendUnavailable => "backend_unavailable",
            TerminalReason::HopLimitExceeded => "hop_limit_exceeded",
            TerminalReason::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|reason| reason.as_str() == s)
    }

    fn for_select_error(err: &SelectError) -> Self {
        match err {
            SelectError::Scorer(ScoreError::BackendUnavailable { .. }) => TerminalReason::BackendUnavailable,
            _ => TerminalReason::SelectionFailed,
        }
    }
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable state of one traversal. Owned by a single `hop` call.
#[derive(Debug, Clone)]
pub struct TraversalState {
    start: PageRef,
    path: Vec<PageRef>,
    visited: HashSet<PageRef>,
    current: PageRef,
    hops_taken: usize,
    cycle_eliminated: bool,
}

impl TraversalState {
    pub fn new(start: PageRef) -> Self {
        let mut visited = HashSet::new();
        visited.insert(start.clone());
        Self {
            start: start.clone(),
            path: Vec::new(),
            visited,
            current: start,
            hops_taken: 0,
            cycle_eliminated: false,
        }
    }

    pub fn start(&self) -> &PageRef {
        &self.start
    }

    pub fn path(&self) -> &[PageRef] {
        &self.path
    }

    pub fn visited(&self) -> &HashSet<PageRef> {
        &self.visited
    }

    pub fn current(&self) -> &PageRef {
        &self.current
    }

    pub fn hops_taken(&self) -> usize {
        self.hops_taken
    }

    pub fn cycle_eliminated(&self) -> bool {
        self.cycle_eliminated
    }

    fn take_hop(&mut self, page: PageRef) {
        self.push(page);
        self.hops_taken += 1;
    }

    fn push(&mut self, page: PageRef) {
        self.visited.insert(page.clone());
        self.path.push(page);
    }

    fn retract(&mut self) {
        if let Some(page) = self.path.pop() {
            if page != self.start && !self.path.contains(&page) {
                self.visited.remove(&page);
            }
        }
    }

    /// Whether the last page on the path already appears earlier on it.
    /// The start page only counts once it has been hopped to.
    fn ends_in_revisit(&self) -> bool {
        match self.path.split_last() {
            Some((last, earlier)) => earlier.contains(last),
            None => false,
        }
    }
}

/// One selection made during a traversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HopStep {
    pub source: PageRef,
    pub selection: SelectionOutcome,
    /// Re-selection after the first pick closed a cycle.
    pub eliminated: bool,
}

/// Everything a finished traversal reports back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HopOutcome {
    pub start: PageRef,
    pub strategy: Strategy,
    pub reason: TerminalReason,
    /// Pages hopped to, in order, excluding the start. Kept for every
    /// outcome, including the page that closed a terminal cycle.
    pub path: Vec<PageRef>,
    pub hops_taken: usize,
    pub cycle_eliminated: bool,
    pub steps: Vec<HopStep>,
    pub error: Option<String>,
    pub hop_limit_policy: HopLimitPolicy,
    pub started_at: i64,
    pub elapsed_ms: u64,
}

/// A traversal that produced no usable path.
#[derive(Error, Debug, Clone)]
#[error("traversal from {start} ended with {reason}")]
pub struct HopFailure {
    pub start: PageRef,
    pub reason: TerminalReason,
    pub error: Option<String>,
}

impl HopOutcome {
    pub fn reached_target(&self) -> bool {
        self.reason == TerminalReason::ReachedTarget
    }

    /// The path callers may rely on: complete when the target was reached,
    /// partial when the hop budget ran out and the policy allows it.
    pub fn usable_path(&self) -> Option<&[PageRef]> {
        match (self.reason, self.hop_limit_policy) {
            (TerminalReason::ReachedTarget, _) => Some(&self.path),
            (TerminalReason::HopLimitExceeded, HopLimitPolicy::ReturnPartial) => Some(&self.path),
            _ => None,
        }
    }

    /// Last page of the traversal, the start page when no hop was taken.
    pub fn end(&self) -> &PageRef {
        self.path.last().unwrap_or(&self.start)
    }

    pub fn into_result(self) -> Result<Vec<PageRef>, HopFailure> {
        if self.usable_path().is_some() {
            Ok(self.path)
        } else {
            Err(HopFailure {
                start: self.start,
                reason: self.reason,
                error: self.error,
            })
        }
    }
}

/// Runs traversals against a link source with one scorer.
#[derive(Clone)]
pub struct HopEngine {
    source: Arc<dyn LinkSource>,
    selector: LinkSelector,
    config: HopConfig,
    cancel: Option<CancellationToken>,
}

impl HopEngine {
    pub fn new(source: Arc<dyn LinkSource>, scorer: Arc<dyn Scorer>, config: HopConfig) -> Self {
        let selector = LinkSelector::new(scorer, config.target_word.clone());
        Self {
            source,
            selector,
            config,
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &HopConfig {
        &self.config
    }

    pub fn strategy(&self) -> Strategy {
        self.selector.scorer().strategy()
    }

    fn should_stop(&self, started: Instant) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
            || self.config.deadline.is_some_and(|d| started.elapsed() >= d)
    }

    /// Walk from `start` until a terminal state. Never fails: every
    /// problem ends up as a [`TerminalReason`] on the outcome.
    pub async fn hop(&self, start: PageRef) -> HopOutcome {
        let started = Instant::now();
        let started_at = chrono::Utc::now().timestamp();
        let scorer = self.selector.scorer();
        let detects_cycles = scorer.detects_cycles();
        let target = &self.config.target_page;

        let mut state = TraversalState::new(start.clone());
        let mut steps = Vec::new();
        let mut error = None;

        info!("Hopping from {} with {}", start.id, scorer.strategy());

        let reason = if start == *target {
            TerminalReason::ReachedTarget
        } else {
            loop {
                if self.should_stop(started) {
                    break TerminalReason::Cancelled;
                }
                if state.hops_taken >= self.config.max_hops {
                    break TerminalReason::HopLimitExceeded;
                }

                let current = state.current.clone();
                let mut candidates = match self.source.extract(&current).await {
                    Ok(candidates) => candidates,
                    Err(e) => {
                        warn!("Failed to extract links from {}: {}", current.id, e);
                        error = Some(e.to_string());
                        break TerminalReason::ExtractionFailed;
                    }
                };
                candidates.truncate(self.config.n_links);
                if candidates.is_empty() {
                    warn!("No article links on {}", current.id);
                    error = Some(format!("no article links on {}", current.id));
                    break TerminalReason::ExtractionFailed;
                }

                let context = if scorer.needs_context() {
                    match self.source.body_text(&current).await {
                        Ok(text) => Some(scorer.prepare_context(&text, &candidates)),
                        Err(e) => {
                            warn!("Failed to fetch body text of {}: {}", current.id, e);
                            error = Some(e.to_string());
                            break TerminalReason::ExtractionFailed;
                        }
                    }
                } else {
                    None
                };

                let selection = match self.selector.select(&candidates, context.as_deref()).await {
                    Ok(selection) => selection,
                    Err(e) => {
                        warn!("Selection failed on {}: {}", current.id, e);
                        error = Some(e.to_string());
                        break TerminalReason::for_select_error(&e);
                    }
                };

                let chosen_index = selection.chosen_index;
                let mut next = selection.chosen.destination.clone();
                debug!("Hop {}: {} -> {}", state.hops_taken + 1, current.id, next.id);
                state.take_hop(next.clone());
                steps.push(HopStep {
                    source: current.clone(),
                    selection,
                    eliminated: false,
                });

                if detects_cycles && state.ends_in_revisit() {
                    if state.cycle_eliminated {
                        info!("Cycle at {} after elimination, stopping", next.id);
                        break TerminalReason::CycleTerminated;
                    }

                    state.retract();
                    let reduced: Vec<Candidate> = candidates
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| *i != chosen_index)
                        .map(|(_, c)| c.clone())
                        .collect();

                    let selection = match self.selector.select(&reduced, context.as_deref()).await {
                        Ok(selection) => selection,
                        Err(e) => {
                            warn!("Re-selection after cycle at {} failed: {}", next.id, e);
                            error = Some(e.to_string());
                            break TerminalReason::for_select_error(&e);
                        }
                    };

                    warn!(
                        "Cycle at {}, eliminated it in favour of {}",
                        next.id, selection.chosen.destination.id
                    );
                    next = selection.chosen.destination.clone();
                    state.push(next.clone());
                    state.cycle_eliminated = true;
                    steps.push(HopStep {
                        source: current.clone(),
                        selection,
                        eliminated: true,
                    });

                    if state.ends_in_revisit() {
                        info!("Replacement {} also closes a cycle, stopping", next.id);
                        break TerminalReason::CycleTerminated;
                    }
                }

                if next == *target {
                    break TerminalReason::ReachedTarget;
                }
                state.current = next;
            }
        };

        info!(
            "Traversal from {} ended with {} after {} hops",
            start.id, reason, state.hops_taken
        );

        HopOutcome {
            start,
            strategy: scorer.strategy(),
            reason,
            hops_taken: state.hops_taken,
            cycle_eliminated: state.cycle_eliminated,
            path: state.path,
            steps,
            error,
            hop_limit_policy: self.config.hop_limit_policy,
            started_at,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(title: &str) -> PageRef {
        PageRef::from_id(format!("/wiki/{}", title))
    }

    #[test]
    fn test_terminal_reason_round_trip_names() {
        for reason in TerminalReason::ALL {
            assert_eq!(TerminalReason::from_str(reason.as_str()), Some(reason));
        }
        assert_eq!(TerminalReason::from_str("unknown"), None);
    }

    #[test]
    fn test_state_revisit_ignores_start() {
        let mut state = TraversalState::new(page("A"));
        state.take_hop(page("B"));
        assert!(!state.ends_in_revisit());
        state.take_hop(page("A"));
        assert!(!state.ends_in_revisit());
        state.take_hop(page("B"));
        assert!(state.ends_in_revisit());
        assert_eq!(state.hops_taken(), 3);
    }

    #[test]
    fn test_state_retract_keeps_visited_consistent() {
        let mut state = TraversalState::new(page("A"));
        state.take_hop(page("B"));
        state.take_hop(page("C"));
        state.retract();
        assert_eq!(state.path(), &[page("B")]);
        assert!(!state.visited().contains(&page("C")));
        assert!(state.visited().contains(&page("A")));
        assert_eq!(state.hops_taken(), 2);
    }

    #[test]
    fn test_usable_path_by_policy() {
        let outcome = HopOutcome {
            start: page("A"),
            strategy: Strategy::Wordnet,
            reason: TerminalReason::HopLimitExceeded,
            path: vec![page("B")],
            hops_taken: 1,
            cycle_eliminated: false,
            steps: Vec::new(),
            error: None,
            hop_limit_policy: HopLimitPolicy::ReturnPartial,
            started_at: 0,
            elapsed_ms: 0,
        };
        assert_eq!(outcome.usable_path(), Some(&[page("B")][..]));

        let failing = HopOutcome {
            hop_limit_policy: HopLimitPolicy::Fail,
            ..outcome.clone()
        };
        assert!(failing.usable_path().is_none());
        let err = failing.into_result().unwrap_err();
        assert_eq!(err.reason, TerminalReason::HopLimitExceeded);

        let cycled = HopOutcome {
            reason: TerminalReason::CycleTerminated,
            ..outcome
        };
        assert!(cycled.usable_path().is_none());
        assert_eq!(cycled.end(), &page("B"));
    }
}
