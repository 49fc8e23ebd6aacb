//! Chapter page parsing: locate the content block and the next-chapter link.

use super::clean::MarkupFragment;
use super::error::ScraperError;
use super::parse_selector;
use scraper::{Html, Selector};

/// What one fetched page yielded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPage {
    /// Children of the content block, or None when the block is missing.
    pub content: Option<MarkupFragment>,
    /// Absolute URL of the next chapter, or None at the end of the novel.
    pub next_url: Option<String>,
}

/// Compiled selectors plus the domain used to absolutize next links.
#[derive(Debug, Clone)]
pub struct PageSelectors {
    content: Selector,
    next_link: Selector,
    domain: String,
}

impl PageSelectors {
    /// `content_class` is the class (or space-separated classes) of the `<div>` holding the
    /// chapter text; `next_button_id` is the id of the `<a>` pointing at the next chapter.
    pub fn new(
        domain: &str,
        content_class: &str,
        next_button_id: &str,
    ) -> Result<Self, ScraperError> {
        let classes: String = content_class
            .split_whitespace()
            .map(|c| format!("[class~=\"{}\"]", attr_value(c)))
            .collect();
        if classes.is_empty() {
            return Err(ScraperError::InvalidSelector {
                selector: content_class.to_string(),
                reason: "content class is empty".to_string(),
            });
        }
        let next_id = next_button_id.trim();
        if next_id.is_empty() {
            return Err(ScraperError::InvalidSelector {
                selector: next_button_id.to_string(),
                reason: "next button id is empty".to_string(),
            });
        }
        Ok(Self {
            content: parse_selector(&format!("div{}", classes))?,
            next_link: parse_selector(&format!("a[id=\"{}\"]", attr_value(next_id)))?,
            domain: domain.trim().to_string(),
        })
    }

    pub fn parse(&self, html: &str) -> ParsedPage {
        let doc = Html::parse_document(html);
        let content = doc
            .select(&self.content)
            .next()
            .map(MarkupFragment::from_element);
        let next_url = doc
            .select(&self.next_link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| resolve_next_link(&self.domain, href));
        ParsedPage { content, next_url }
    }
}

/// Links that already mention the domain are kept verbatim; protocol-relative links take
/// the domain's scheme; anything else is treated as a path under the domain. An empty href
/// means there is no next chapter.
pub fn resolve_next_link(domain: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href == "#" {
        return None;
    }
    if let Some(rest) = href.strip_prefix("//") {
        let scheme = domain.split_once("://").map_or("https", |(scheme, _)| scheme);
        return Some(format!("{}://{}", scheme, rest));
    }
    if href.contains(domain) {
        return Some(href.to_string());
    }
    Some(format!(
        "{}/{}",
        domain.trim_end_matches('/'),
        href.trim_start_matches('/')
    ))
}

fn attr_value(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selectors() -> PageSelectors {
        PageSelectors::new("https://example.com", "txt", "next_chap").unwrap()
    }

    #[test]
    fn relative_link_is_prefixed_with_domain() {
        assert_eq!(
            resolve_next_link("https://example.com", "/ch/5").as_deref(),
            Some("https://example.com/ch/5")
        );
    }

    #[test]
    fn absolute_in_domain_link_passes_through() {
        let link = "https://example.com/novel/ch/6?x=1";
        assert_eq!(
            resolve_next_link("https://example.com", link).as_deref(),
            Some(link)
        );
    }

    #[test]
    fn join_does_not_double_slashes() {
        assert_eq!(
            resolve_next_link("https://example.com/", "ch/5").as_deref(),
            Some("https://example.com/ch/5")
        );
    }

    #[test]
    fn protocol_relative_link_takes_domain_scheme() {
        assert_eq!(
            resolve_next_link("https://example.com", "//example.com/ch/5").as_deref(),
            Some("https://example.com/ch/5")
        );
        assert_eq!(
            resolve_next_link("http://example.com", "//cdn.example.com/ch/5").as_deref(),
            Some("http://cdn.example.com/ch/5")
        );
    }

    #[test]
    fn empty_href_means_no_next_link() {
        assert_eq!(resolve_next_link("https://example.com", "  "), None);
        assert_eq!(resolve_next_link("https://example.com", "#"), None);
    }

    #[test]
    fn parse_finds_content_and_next_link() {
        let html = r#"<html><body>
            <div class="txt"><p>Hello</p><p>World</p></div>
            <a id="next_chap" href="/ch/2">Next</a>
        </body></html>"#;
        let page = selectors().parse(html);
        let content = page.content.expect("content block");
        assert!(content.as_str().contains("<p>Hello</p>"));
        assert_eq!(page.next_url.as_deref(), Some("https://example.com/ch/2"));
    }

    #[test]
    fn parse_matches_class_among_several() {
        let html = r#"<div class="chapter txt big"><p>x</p></div>"#;
        assert!(selectors().parse(html).content.is_some());
    }

    #[test]
    fn parse_without_matches_yields_nothing() {
        let html = r#"<div class="other"><p>x</p></div><a id="prev" href="/ch/0">Prev</a>"#;
        let page = selectors().parse(html);
        assert!(page.content.is_none());
        assert!(page.next_url.is_none());
    }

    #[test]
    fn anchor_without_href_is_not_a_next_link() {
        let html = r#"<div class="txt"><p>x</p></div><a id="next_chap">Next</a>"#;
        assert!(selectors().parse(html).next_url.is_none());
    }

    #[test]
    fn empty_content_class_is_rejected() {
        let result = PageSelectors::new("https://example.com", "  ", "next");
        assert!(matches!(result, Err(ScraperError::InvalidSelector { .. })));
    }
}
