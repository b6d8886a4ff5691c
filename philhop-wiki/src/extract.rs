use crate::page::{ARTICLE_PREFIX, Candidate, PageRef};
use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::debug;
use url::Url;

/// Containers holding the article prose, outermost first.
const CONTENT_SELECTOR: &str =
    "div.mw-parser-output p, div.mw-body-content p, div.vector-body p";

/// Classes of blocks whose links are never article prose.
const EXCLUDED_CLASSES: &[&str] = &[
    "thumb",
    "sidebar",
    "hatnote",
    "infobox",
    "navbox",
    "reflist",
    "mw-empty-elt",
];

/// Elements that start a fresh parenthesis count.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "li", "dd", "dt", "td", "th", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote",
    "section", "nav", "header", "footer",
];

/// Namespace prefixes of pages that are not articles.
const NON_ARTICLE_NAMESPACES: &[&str] = &[
    "file",
    "image",
    "media",
    "help",
    "wikipedia",
    "wp",
    "template",
    "category",
    "special",
    "portal",
    "talk",
    "user",
    "mediawiki",
    "module",
    "draft",
    "wikt",
    "wiktionary",
];

/// Extract the ordered link candidates from an article's HTML.
///
/// Looks at the first `max_paragraphs` prose paragraphs and keeps article
/// links outside parenthetical asides. When the paragraphs yield nothing,
/// every anchor in the document is considered with the same filters.
pub fn extract_candidates(html: &str, base: &Url, max_paragraphs: usize) -> Vec<Candidate> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    for paragraph in prose_paragraphs(&document).into_iter().take(max_paragraphs) {
        collect_links(paragraph, base, &mut links);
    }

    if links.is_empty() {
        debug!("No paragraph links found, falling back to whole document");
        collect_links(document.root_element(), base, &mut links);
    }

    links
        .into_iter()
        .enumerate()
        .map(|(ordinal, (destination, anchor_text))| Candidate::new(destination, anchor_text, ordinal))
        .collect()
}

/// Plain text of the article prose, one paragraph per line, with citation
/// markers such as `[12]` removed.
pub fn extract_body_text(html: &str) -> String {
    let document = Html::parse_document(html);

    prose_paragraphs(&document)
        .into_iter()
        .map(|p| strip_reference_markers(p.text().collect::<String>().trim()))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whether an article path points into a non-article namespace.
pub fn is_non_article(id: &str) -> bool {
    let title = id.strip_prefix(ARTICLE_PREFIX).unwrap_or(id);
    match title.split_once(':') {
        Some((prefix, _)) => {
            let prefix = prefix.to_lowercase();
            let prefix = prefix.strip_suffix("_talk").unwrap_or(&prefix);
            NON_ARTICLE_NAMESPACES.contains(&prefix)
        }
        None => false,
    }
}

fn prose_paragraphs(document: &Html) -> Vec<ElementRef<'_>> {
    let Ok(selector) = Selector::parse(CONTENT_SELECTOR) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter(|p| !is_excluded(p.value()) && !inside_excluded(p))
        .collect()
}

fn collect_links(scope: ElementRef<'_>, base: &Url, links: &mut Vec<(PageRef, String)>) {
    let mut depth: usize = 0;

    for node in scope.descendants() {
        match node.value() {
            Node::Text(text) => {
                if node
                    .parent()
                    .and_then(ElementRef::wrap)
                    .is_some_and(|parent| matches!(parent.value().name(), "script" | "style"))
                {
                    continue;
                }
                for c in text.chars() {
                    match c {
                        '(' => depth += 1,
                        ')' => depth = depth.saturating_sub(1),
                        _ => {}
                    }
                }
            }
            Node::Element(element) if BLOCK_ELEMENTS.contains(&element.name()) => depth = 0,
            Node::Element(element) if element.name() == "a" && depth == 0 => {
                let Some(anchor) = ElementRef::wrap(node) else {
                    continue;
                };
                let Some(href) = element.attr("href") else {
                    continue;
                };
                if !href.starts_with(ARTICLE_PREFIX) || inside_excluded(&anchor) {
                    continue;
                }
                let Some(destination) = PageRef::from_href(base, href) else {
                    continue;
                };
                if is_non_article(&destination.id) {
                    debug!("  -> Skipping non-article link {}", destination.id);
                    continue;
                }

                let anchor_text = anchor.text().collect::<String>().trim().to_string();
                if anchor_text.is_empty() {
                    continue;
                }

                let destination = match element.attr("title") {
                    Some(title) if !title.trim().is_empty() => {
                        PageRef::new(destination.id, title.trim())
                    }
                    _ => destination,
                };

                debug!("Found link: {} ({})", destination.id, anchor_text);
                links.push((destination, anchor_text));
            }
            _ => {}
        }
    }
}

fn is_excluded(element: &Element) -> bool {
    element.name() == "table" || element.classes().any(|class| EXCLUDED_CLASSES.contains(&class))
}

fn inside_excluded(element: &ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| is_excluded(ancestor.value()))
}

fn strip_reference_markers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('[') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        match tail.find(']') {
            Some(end) if end > 0 && tail[..end].chars().all(|c| c.is_ascii_digit()) => {
                rest = &tail[end + 1..];
            }
            _ => {
                out.push('[');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://en.wikipedia.org").unwrap()
    }

    fn article(body: &str) -> String {
        format!(
            r#"<html><body><div class="vector-body"><div class="mw-body-content"><div class="mw-parser-output">{}</div></div></div></body></html>"#,
            body
        )
    }

    fn anchors(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.anchor_text.as_str()).collect()
    }

    #[test]
    fn test_links_in_document_order() {
        let html = article(
            r#"<p>A <a href="/wiki/Cat">cat</a> is a <a href="/wiki/Mammal">mammal</a>.</p>
               <p>It likes <a href="/wiki/Fish">fish</a>.</p>"#,
        );
        let candidates = extract_candidates(&html, &base(), 3);
        assert_eq!(anchors(&candidates), vec!["cat", "mammal", "fish"]);
        assert_eq!(candidates[2].ordinal, 2);
        assert_eq!(candidates[1].destination.id, "/wiki/Mammal");
    }

    #[test]
    fn test_paragraphs_not_duplicated_by_nested_containers() {
        let html = article(r#"<p><a href="/wiki/Cat">cat</a></p>"#);
        let candidates = extract_candidates(&html, &base(), 3);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_parenthetical_links_skipped() {
        let html = article(
            r#"<p>Python (<a href="/wiki/Help:IPA">pronounced</a> or <a href="/wiki/Snake">snake</a>) is a <a href="/wiki/Programming_language">programming language</a>.</p>"#,
        );
        let candidates = extract_candidates(&html, &base(), 3);
        assert_eq!(anchors(&candidates), vec!["programming language"]);
    }

    #[test]
    fn test_balanced_parens_in_anchor_text_do_not_leak() {
        let html = article(
            r#"<p>See <a href="/wiki/Mercury_(planet)">Mercury (planet)</a> and <a href="/wiki/Venus">Venus</a>.</p>"#,
        );
        let candidates = extract_candidates(&html, &base(), 3);
        assert_eq!(anchors(&candidates), vec!["Mercury (planet)", "Venus"]);
    }

    #[test]
    fn test_only_first_paragraphs_used() {
        let html = article(
            r#"<p><a href="/wiki/One">one</a></p><p><a href="/wiki/Two">two</a></p><p><a href="/wiki/Three">three</a></p>"#,
        );
        let candidates = extract_candidates(&html, &base(), 2);
        assert_eq!(anchors(&candidates), vec!["one", "two"]);
    }

    #[test]
    fn test_excluded_blocks_and_namespaces() {
        let html = article(
            r#"<div class="hatnote"><p><a href="/wiki/Other">other use</a></p></div>
               <table><tr><td><p><a href="/wiki/Boxed">boxed</a></p></td></tr></table>
               <p><a href="/wiki/File:Cat.jpg">image</a> <a href="/wiki/Category:Cats">cats</a>
               <a href="/wiki/Wikipedia:Citation_needed">citation</a> <a href="/wiki/Felidae">felid</a></p>"#,
        );
        let candidates = extract_candidates(&html, &base(), 3);
        assert_eq!(anchors(&candidates), vec!["felid"]);
        assert_eq!(candidates[0].ordinal, 0);
    }

    #[test]
    fn test_non_article_hrefs_skipped() {
        let html = article(
            r##"<p><a href="#cite_note-1">[1]</a> <a href="/w/index.php?title=X&action=edit">edit</a> <a href="https://example.com/">ext</a> <a href="/wiki/Logic">logic</a></p>"##,
        );
        let candidates = extract_candidates(&html, &base(), 3);
        assert_eq!(anchors(&candidates), vec!["logic"]);
    }

    #[test]
    fn test_title_attribute_becomes_display_title() {
        let html = article(r#"<p><a href="/wiki/Ancient_Greece" title="Ancient Greece">Greek</a></p>"#);
        let candidates = extract_candidates(&html, &base(), 3);
        assert_eq!(candidates[0].destination.display_title, "Ancient Greece");
        assert_eq!(candidates[0].anchor_text, "Greek");
    }

    #[test]
    fn test_fallback_to_whole_document() {
        let html = r#"<html><body><p>No container here.</p><div><a href="/wiki/Main_Page">main</a> (<a href="/wiki/Aside">aside</a>)</div></body></html>"#;
        let candidates = extract_candidates(html, &base(), 3);
        assert_eq!(anchors(&candidates), vec!["main"]);
    }

    #[test]
    fn test_fallback_unbalanced_parenthesis_stays_in_its_block() {
        let html = r#"<html><body><div class="menu">Tools (beta</div><ul><li><a href="/wiki/Logic">logic</a></li><li>(<a href="/wiki/Aside">aside</a>)</li></ul></body></html>"#;
        let candidates = extract_candidates(html, &base(), 3);
        assert_eq!(anchors(&candidates), vec!["logic"]);
    }

    #[test]
    fn test_no_links_at_all() {
        let html = article("<p>Plain text only.</p>");
        assert!(extract_candidates(&html, &base(), 3).is_empty());
    }

    #[test]
    fn test_body_text_strips_reference_markers() {
        let html = article(
            r#"<p>Philosophy is the study of <a href="/wiki/Existence">existence</a>.<sup>[1]</sup></p><p>It is old [a].</p>"#,
        );
        assert_eq!(
            extract_body_text(&html),
            "Philosophy is the study of existence.\nIt is old [a]."
        );
    }

    #[test]
    fn test_is_non_article() {
        assert!(is_non_article("/wiki/Help:IPA/English"));
        assert!(is_non_article("/wiki/Template_talk:Foo"));
        assert!(is_non_article("/wiki/wikt:philosophy"));
        assert!(!is_non_article("/wiki/Philosophy"));
        assert!(!is_non_article("/wiki/Star_Wars:_Episode_IV"));
    }
}
