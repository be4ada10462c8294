//! Fenced-code language inference.
//!
//! Chat UIs put the language of a code block in different places: a
//! `language-*` class on the `<code>`, a class on a wrapper, a `data-language`
//! attribute, or a header label next to the block. Candidates are gathered in
//! a fixed order and the first one that survives cleaning wins, so the order
//! below is part of the output contract.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::dom;

static CLASS_LANGUAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:language|lang)-([a-z0-9_+#-]+)").unwrap());

static DATA_LANGUAGE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[data-language]").unwrap());

static CODE_HEADER_LANGUAGE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"[data-testid*="code"] [class*="language-"]"#).unwrap());

const ALIASES: &[(&str, &str)] = &[
    ("js", "javascript"),
    ("ts", "typescript"),
    ("py", "python"),
    ("sh", "bash"),
    ("shell", "bash"),
    ("yml", "yaml"),
    ("md", "markdown"),
];

/// Guess the fence language for a `<code>` element. Empty when nothing is found.
///
/// Candidate order:
/// 1. class matches on the code element, its `<pre>`, the pre's parent and
///    that parent's parent;
/// 2. `data-language` / `data-lang` on the same four nodes, same order;
/// 3. a labelled descendant of the pre's parent.
pub fn infer_language(code: ElementRef<'_>) -> String {
    let pre = dom::closest(code, "pre");
    let block_parent = pre.and_then(dom::parent_element);
    let outer = block_parent.and_then(dom::parent_element);
    let nodes = [Some(code), pre, block_parent, outer];

    let mut candidates: Vec<String> = Vec::new();
    for node in nodes.iter().flatten() {
        push_class_matches(*node, &mut candidates);
    }
    for node in nodes.iter().flatten() {
        push_data_language(*node, &mut candidates);
    }

    let container = block_parent.or_else(|| dom::parent_element(code));
    if let Some(hint) = container.and_then(container_hint) {
        candidates.push(hint);
    }

    candidates
        .iter()
        .map(|candidate| clean_candidate(candidate))
        .find(|cleaned| !cleaned.is_empty())
        .map(|cleaned| normalize_alias(&cleaned))
        .unwrap_or_default()
}

/// Every `language-X` / `lang-X` token in a class string, in declaration order.
pub fn class_language_tokens(class: &str) -> Vec<String> {
    CLASS_LANGUAGE_RE
        .captures_iter(class)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

fn push_class_matches(el: ElementRef<'_>, out: &mut Vec<String>) {
    if let Some(class) = dom::attr(el, "class") {
        out.extend(class_language_tokens(class));
    }
}

fn push_data_language(el: ElementRef<'_>, out: &mut Vec<String>) {
    let value = ["data-language", "data-lang"]
        .iter()
        .filter_map(|name| dom::attr(el, name))
        .find(|v| !v.is_empty());
    if let Some(v) = value {
        out.push(v.to_string());
    }
}

fn container_hint(container: ElementRef<'_>) -> Option<String> {
    let labelled = dom::query_descendant(container, &DATA_LANGUAGE_SELECTOR)
        .and_then(|el| dom::attr(el, "data-language"))
        .filter(|v| !v.is_empty());
    if let Some(v) = labelled {
        return Some(v.to_string());
    }

    dom::query_descendant(container, &CODE_HEADER_LANGUAGE_SELECTOR)
        .and_then(|el| dom::attr(el, "class"))
        .and_then(|class| class_language_tokens(class).into_iter().next())
}

/// Lowercase, drop a `language-`/`lang-` prefix and keep `[a-z0-9_+#-]`.
pub fn clean_candidate(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let stripped = lowered.strip_prefix("language-").unwrap_or(&lowered);
    let stripped = stripped.strip_prefix("lang-").unwrap_or(stripped);
    stripped
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '+' | '#' | '-'))
        .collect()
}

pub fn normalize_alias(tag: &str) -> String {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == tag)
        .map(|(_, full)| full.to_string())
        .unwrap_or_else(|| tag.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Page;

    fn infer(html: &str) -> String {
        let page = Page::parse(html, None);
        let code = page.query(&Selector::parse("code").unwrap()).unwrap();
        infer_language(code)
    }

    #[test]
    fn first_declared_class_wins() {
        assert_eq!(infer(r#"<pre><code class="foo language-ts">x</code></pre>"#), "typescript");
        assert_eq!(infer(r#"<pre><code class="language-js foo">x</code></pre>"#), "javascript");
        assert_eq!(infer(r#"<pre><code class="lang-py language-rust">x</code></pre>"#), "python");
    }

    #[test]
    fn code_class_beats_wrapper_class() {
        let html = r#"<div class="language-go"><pre class="language-c"><code class="language-rust">x</code></pre></div>"#;
        assert_eq!(infer(html), "rust");
    }

    #[test]
    fn ancestor_classes_checked_outward() {
        let html = r#"<section class="language-sql"><div class="language-yml"><pre><code>x</code></pre></div></section>"#;
        assert_eq!(infer(html), "yaml");

        let html = r#"<section class="language-sql"><div><pre><code>x</code></pre></div></section>"#;
        assert_eq!(infer(html), "sql");
    }

    #[test]
    fn classes_beat_data_attributes_on_any_node() {
        let html = r#"<div class="lang-sh"><pre data-language="python"><code>x</code></pre></div>"#;
        assert_eq!(infer(html), "bash");
    }

    #[test]
    fn data_attributes_follow_node_order() {
        let html = r#"<div data-lang="ruby"><pre data-language="Kotlin"><code>x</code></pre></div>"#;
        assert_eq!(infer(html), "kotlin");
    }

    #[test]
    fn falls_back_to_labelled_descendant_of_container() {
        let html = r#"<div><div class="header"><span data-language="TypeScript"></span></div><pre><code>x</code></pre></div>"#;
        assert_eq!(infer(html), "typescript");

        let html = r#"<div data-testid="code-block"><div><span class="hl language-md">md</span></div><pre><code>x</code></pre></div>"#;
        assert_eq!(infer(html), "markdown");
    }

    #[test]
    fn candidates_that_clean_to_nothing_are_skipped() {
        let html = r#"<pre data-lang="C++"><code data-language="!!!">x</code></pre>"#;
        assert_eq!(infer(html), "c++");
    }

    #[test]
    fn nothing_found_is_empty() {
        assert_eq!(infer("<pre><code>plain</code></pre>"), "");
    }

    #[test]
    fn cleaning_strips_prefix_and_foreign_characters() {
        assert_eq!(clean_candidate(" Language-C# "), "c#");
        assert_eq!(clean_candidate("lang-Objective C"), "objectivec");
        assert_eq!(clean_candidate("???"), "");
        assert_eq!(normalize_alias("shell"), "bash");
        assert_eq!(normalize_alias("haskell"), "haskell");
    }
}
