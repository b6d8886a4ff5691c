use crate::error::Result;
use crate::page::{Candidate, PageRef};
use futures::future::BoxFuture;

/// Producer of the ordered outgoing links of a page.
///
/// Implementations must preserve document order and must already exclude
/// parenthetical asides and non-article namespaces. Results are expected to
/// be deterministic for a given page snapshot.
pub trait LinkSource: Send + Sync {
    fn extract<'a>(&'a self, page: &'a PageRef) -> BoxFuture<'a, Result<Vec<Candidate>>>;

    /// Prose text of the page, used by scorers that need surrounding context.
    fn body_text<'a>(&'a self, page: &'a PageRef) -> BoxFuture<'a, Result<String>>;
}
