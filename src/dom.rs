//! Read-only access to a saved chat page.
//!
//! The page is parsed once with `scraper` (html5ever) and then only queried.
//! Helpers here mirror the handful of DOM operations the extractors need:
//! scoped descendant queries, `closest`, parent lookup and text content.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());

static CANONICAL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"link[rel="canonical"][href]"#).unwrap());

static OG_URL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:url"][content]"#).unwrap());

// Chrome and Edge stamp "Save page as" output with `<!-- saved from url=(0040)https://... -->`.
static SAVED_FROM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"saved from url=\(\d+\)(\S+)").unwrap());

/// A parsed chat page plus the address it was captured from.
pub struct Page {
    document: Html,
    url: Option<Url>,
}

impl Page {
    /// Parse `html`. When `url` is `None`, the address is recovered from the
    /// canonical link, the `og:url` meta tag or the browser's "saved from" marker.
    pub fn parse(html: &str, url: Option<Url>) -> Self {
        let document = Html::parse_document(html);
        let url = url.or_else(|| detect_page_url(&document, html));
        Self { document, url }
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// The page address as text, empty when unknown.
    pub fn href(&self) -> String {
        self.url.as_ref().map(Url::to_string).unwrap_or_default()
    }

    pub fn host(&self) -> Option<&str> {
        self.url.as_ref()?.host_str()
    }

    /// Text of the document `<title>`, trimmed.
    pub fn title(&self) -> String {
        self.query(&TITLE_SELECTOR)
            .map(|t| text_content(t).trim().to_string())
            .unwrap_or_default()
    }

    /// All matching elements in document order.
    pub fn select_all<'a>(&'a self, selector: &Selector) -> Vec<ElementRef<'a>> {
        self.document.select(selector).collect()
    }

    pub fn query<'a>(&'a self, selector: &Selector) -> Option<ElementRef<'a>> {
        self.document.select(selector).next()
    }
}

fn detect_page_url(document: &Html, raw: &str) -> Option<Url> {
    let from_canonical = document
        .select(&CANONICAL_SELECTOR)
        .filter_map(|el| el.value().attr("href"))
        .find_map(|href| Url::parse(href.trim()).ok());
    if from_canonical.is_some() {
        return from_canonical;
    }

    let from_og = document
        .select(&OG_URL_SELECTOR)
        .filter_map(|el| el.value().attr("content"))
        .find_map(|content| Url::parse(content.trim()).ok());
    if from_og.is_some() {
        return from_og;
    }

    SAVED_FROM_RE
        .captures(raw)
        .and_then(|caps| Url::parse(&caps[1]).ok())
}

/// Lowercase local name of an element (`"pre"`, `"user-query"`, ...).
pub fn tag_name<'a>(el: ElementRef<'a>) -> &'a str {
    el.value().name()
}

pub fn attr<'a>(el: ElementRef<'a>, name: &str) -> Option<&'a str> {
    el.value().attr(name)
}

/// Concatenated text of every descendant text node.
pub fn text_content(el: ElementRef<'_>) -> String {
    el.text().collect()
}

pub fn parent_element<'a>(el: ElementRef<'a>) -> Option<ElementRef<'a>> {
    el.parent().and_then(ElementRef::wrap)
}

/// The element itself or its nearest ancestor with the given tag.
pub fn closest<'a>(el: ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
    std::iter::once(el)
        .chain(el.ancestors().filter_map(ElementRef::wrap))
        .find(|candidate| tag_name(*candidate) == tag)
}

/// Strict descendants of `el` (never `el` itself) in document order.
pub fn descendant_elements<'a>(el: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    el.descendants().skip(1).filter_map(ElementRef::wrap)
}

/// First strict descendant matching `selector`.
pub fn query_descendant<'a>(el: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    descendant_elements(el).find(|candidate| selector.matches(candidate))
}

/// First strict descendant with the given tag.
pub fn find_descendant_tag<'a>(el: ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
    descendant_elements(el).find(|candidate| tag_name(*candidate) == tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first<'a>(page: &'a Page, css: &str) -> ElementRef<'a> {
        page.query(&Selector::parse(css).unwrap()).unwrap()
    }

    #[test]
    fn explicit_url_wins_over_page_markers() {
        let html = r#"<html><head><link rel="canonical" href="https://gemini.google.com/app/1"></head></html>"#;
        let page = Page::parse(html, Some(Url::parse("https://chatgpt.com/c/2").unwrap()));
        assert_eq!(page.host(), Some("chatgpt.com"));
    }

    #[test]
    fn recovers_url_from_canonical_link() {
        let html = r#"<html><head><link rel="canonical" href="https://gemini.google.com/app/1"></head></html>"#;
        let page = Page::parse(html, None);
        assert_eq!(page.host(), Some("gemini.google.com"));
        assert_eq!(page.href(), "https://gemini.google.com/app/1");
    }

    #[test]
    fn recovers_url_from_saved_from_marker() {
        let html = "<!DOCTYPE html>\n<!-- saved from url=(0027)https://chatgpt.com/c/abc -->\n<html><body></body></html>";
        let page = Page::parse(html, None);
        assert_eq!(page.href(), "https://chatgpt.com/c/abc");
    }

    #[test]
    fn unknown_url_is_empty() {
        let page = Page::parse("<p>hi</p>", None);
        assert_eq!(page.host(), None);
        assert_eq!(page.href(), "");
    }

    #[test]
    fn closest_includes_self_and_walks_up() {
        let page = Page::parse("<div><pre class='x'><code>a</code></pre></div>", None);
        let code = first(&page, "code");
        assert_eq!(tag_name(closest(code, "pre").unwrap()), "pre");
        assert_eq!(tag_name(closest(code, "code").unwrap()), "code");
        assert!(closest(code, "a").is_none());
    }

    #[test]
    fn descendant_query_skips_the_scope_element() {
        let page = Page::parse("<div class='m'><div class='m' id='inner'>x</div></div>", None);
        let outer = first(&page, "div.m");
        let found = query_descendant(outer, &Selector::parse(".m").unwrap()).unwrap();
        assert_eq!(attr(found, "id"), Some("inner"));
    }

    #[test]
    fn title_is_trimmed() {
        let page = Page::parse("<html><head><title>  Chat - Site </title></head></html>", None);
        assert_eq!(page.title(), "Chat - Site");
    }
}
