use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use url::Url;

/// Path prefix shared by every article link.
pub const ARTICLE_PREFIX: &str = "/wiki/";

/// A node in the implicit article graph.
///
/// Identity is the normalised article path (`/wiki/Title`); the display
/// title is carried along for reports and does not take part in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRef {
    pub id: String,
    pub display_title: String,
}

impl PageRef {
    pub fn new(id: impl Into<String>, display_title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_title: display_title.into(),
        }
    }

    /// Build a page reference from an id alone, deriving the title from it.
    pub fn from_id(id: impl Into<String>) -> Self {
        let id = id.into();
        let display_title = title_from_id(&id);
        Self { id, display_title }
    }

    /// Resolve an `href` found on a page against the wiki base URL.
    ///
    /// Returns `None` for anything that is not an article path on the same
    /// host. Fragments are dropped so `/wiki/A#History` and `/wiki/A` are
    /// the same page.
    pub fn from_href(base: &Url, href: &str) -> Option<Self> {
        let mut resolved = base.join(href).ok()?;
        if resolved.host_str() != base.host_str() {
            return None;
        }
        resolved.set_fragment(None);
        resolved.set_query(None);

        let path = resolved.path();
        if !path.starts_with(ARTICLE_PREFIX) || path.len() == ARTICLE_PREFIX.len() {
            return None;
        }

        Some(Self::from_id(path.to_string()))
    }

    /// Accept a full article URL, an article path, or a bare title.
    pub fn parse(base: &Url, input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        if input.starts_with("http://") || input.starts_with("https://") || input.starts_with('/')
        {
            return Self::from_href(base, input);
        }
        Self::from_title(base, input)
    }

    /// Build a page reference from a human title such as `Ancient Greek`.
    pub fn from_title(base: &Url, title: &str) -> Option<Self> {
        let href = format!("{}{}", ARTICLE_PREFIX, title.trim().replace(' ', "_"));
        let mut page = Self::from_href(base, &href)?;
        page.display_title = title.trim().to_string();
        Some(page)
    }

    /// Absolute URL of the article.
    pub fn url(&self, base: &Url) -> Option<Url> {
        base.join(&self.id).ok()
    }
}

impl PartialEq for PageRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PageRef {}

impl Hash for PageRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_title)
    }
}

/// One outgoing link of a page, in document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub destination: PageRef,
    pub anchor_text: String,
    pub ordinal: usize,
}

impl Candidate {
    pub fn new(destination: PageRef, anchor_text: impl Into<String>, ordinal: usize) -> Self {
        Self {
            destination,
            anchor_text: anchor_text.into(),
            ordinal,
        }
    }
}

fn title_from_id(id: &str) -> String {
    id.strip_prefix(ARTICLE_PREFIX)
        .unwrap_or(id)
        .replace('_', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://en.wikipedia.org").unwrap()
    }

    #[test]
    fn test_from_href_relative() {
        let page = PageRef::from_href(&base(), "/wiki/Ancient_Greek").unwrap();
        assert_eq!(page.id, "/wiki/Ancient_Greek");
        assert_eq!(page.display_title, "Ancient Greek");
    }

    #[test]
    fn test_from_href_strips_fragment() {
        let a = PageRef::from_href(&base(), "/wiki/Logic#History").unwrap();
        let b = PageRef::from_href(&base(), "/wiki/Logic").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_from_href_rejects_non_articles() {
        assert!(PageRef::from_href(&base(), "/w/index.php?title=Logic").is_none());
        assert!(PageRef::from_href(&base(), "https://example.com/wiki/Logic").is_none());
        assert!(PageRef::from_href(&base(), "/wiki/").is_none());
    }

    #[test]
    fn test_encoded_and_plain_forms_match() {
        let encoded = PageRef::from_href(&base(), "/wiki/Caf%C3%A9").unwrap();
        let plain = PageRef::from_href(&base(), "/wiki/Café").unwrap();
        assert_eq!(encoded, plain);
    }

    #[test]
    fn test_parse_accepts_url_path_and_title() {
        let from_url = PageRef::parse(&base(), "https://en.wikipedia.org/wiki/London").unwrap();
        let from_path = PageRef::parse(&base(), "/wiki/London").unwrap();
        let from_title = PageRef::parse(&base(), "London").unwrap();
        assert_eq!(from_url, from_path);
        assert_eq!(from_path, from_title);
    }

    #[test]
    fn test_equality_ignores_title() {
        let a = PageRef::new("/wiki/Philosophy", "Philosophy");
        let b = PageRef::new("/wiki/Philosophy", "something else");
        assert_eq!(a, b);
    }

    #[test]
    fn test_url_joins_base() {
        let page = PageRef::from_id("/wiki/Logic");
        assert_eq!(
            page.url(&base()).unwrap().as_str(),
            "https://en.wikipedia.org/wiki/Logic"
        );
    }
}
