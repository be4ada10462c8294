//! DOM-to-Markdown rendering for chat message bodies.
//!
//! A plain recursive walk over a read-only subtree. The only traversal state is
//! the `in_pre` flag passed down explicitly so inline `<code>` inside a
//! preformatted block is not wrapped in backticks a second time. Normalization
//! (`clean_markdown`) runs once on the finished string, never mid-walk.
//!
//! Nesting deeper than [`MAX_RENDER_DEPTH`] is emitted as its plain text
//! content, so pathological pages cannot exhaust the stack.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Node};

use crate::dom;
use crate::language;

/// Elements rendered as a paragraph: trimmed content followed by a blank line.
pub const BLOCK_TAGS: &[&str] = &[
    "p",
    "div",
    "section",
    "article",
    "blockquote",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "ul",
    "ol",
];

/// Element depth below which subtrees are flattened to text.
pub const MAX_RENDER_DEPTH: usize = 512;

static MULTI_NEWLINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static TRAILING_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+\n").unwrap());
static LEADING_NEWLINES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\n+").unwrap());

/// Render a subtree to normalized Markdown.
pub fn render_markdown(node: ElementRef<'_>) -> String {
    clean_markdown(&to_markdown(node, false))
}

/// Every resolvable image URL under `node`, in document order, duplicates kept.
pub fn collect_images(node: ElementRef<'_>) -> Vec<String> {
    dom::descendant_elements(node)
        .filter(|el| dom::tag_name(*el) == "img")
        .filter_map(resolve_image_url)
        .collect()
}

/// Collapse runs of blank lines, strip trailing blanks before newlines and trim.
pub fn clean_markdown(text: &str) -> String {
    let text = MULTI_NEWLINE_RE.replace_all(text, "\n\n");
    let text = TRAILING_SPACE_RE.replace_all(&text, "\n");
    let text = LEADING_NEWLINES_RE.replace(&text, "");
    text.trim().to_string()
}

/// Render one element without the final clean pass.
pub fn to_markdown(el: ElementRef<'_>, in_pre: bool) -> String {
    walk(el, in_pre, 0)
}

fn walk(el: ElementRef<'_>, in_pre: bool, depth: usize) -> String {
    if depth > MAX_RENDER_DEPTH {
        return dom::text_content(el);
    }

    let tag = dom::tag_name(el);
    match tag {
        "pre" => render_code_block(el),
        "code" => {
            let text = dom::text_content(el);
            if in_pre {
                text
            } else {
                format!("`{}`", text.trim())
            }
        }
        "img" => render_image(el),
        "a" => render_link(el, in_pre, depth),
        "br" => "\n".to_string(),
        "li" => format!("- {}\n", render_children(el, in_pre, depth).trim()),
        _ => {
            let content = render_children(el, in_pre, depth);
            match tag {
                "strong" | "b" => format!("**{content}**"),
                "em" | "i" => format!("*{content}*"),
                t if BLOCK_TAGS.contains(&t) => format!("{}\n\n", content.trim()),
                _ => content,
            }
        }
    }
}

fn render_children(el: ElementRef<'_>, in_pre: bool, depth: usize) -> String {
    let mut out = String::new();
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&text.text),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    out.push_str(&walk(child_el, in_pre, depth + 1));
                }
            }
            _ => {}
        }
    }
    out
}

// Code text is taken verbatim; nothing inside the block is re-rendered.
fn render_code_block(pre: ElementRef<'_>) -> String {
    let code = dom::find_descendant_tag(pre, "code");
    let text = code
        .map(dom::text_content)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| dom::text_content(pre));
    let text = text.strip_suffix('\n').unwrap_or(&text);
    let lang = code.map(language::infer_language).unwrap_or_default();
    format!("\n\n```{lang}\n{text}\n```\n\n")
}

fn render_image(img: ElementRef<'_>) -> String {
    let Some(src) = resolve_image_url(img) else {
        return String::new();
    };
    let alt = dom::attr(img, "alt")
        .filter(|a| !a.is_empty())
        .unwrap_or("image");
    format!("![{alt}]({src})")
}

fn render_link(a: ElementRef<'_>, in_pre: bool, depth: usize) -> String {
    // Emitting `[![..](..)](..)` corrupts easily; keep only the image.
    if dom::find_descendant_tag(a, "img").is_some() {
        return render_children(a, in_pre, depth);
    }

    let text = dom::text_content(a).trim().to_string();
    match dom::attr(a, "href").filter(|h| !h.is_empty()) {
        Some(href) => {
            let label = if text.is_empty() { href } else { text.as_str() };
            format!("[{label}]({href})")
        }
        None => text,
    }
}

/// Pick a stable URL for an `<img>`, or `None` when only an inline or
/// in-memory source is available.
///
/// `src` is preferred over `data-src`. Protocol-relative URLs get `https:`.
/// A `blob:` source is replaced by the enclosing link target when that target
/// is an absolute http(s) URL.
pub fn resolve_image_url(img: ElementRef<'_>) -> Option<String> {
    let raw = ["src", "data-src"]
        .iter()
        .filter_map(|name| dom::attr(img, name))
        .map(str::trim)
        .find(|v| !v.is_empty())?;

    let url = if raw.starts_with("//") {
        format!("https:{raw}")
    } else {
        raw.to_string()
    };

    if url.starts_with("blob:") {
        return dom::closest(img, "a")
            .and_then(|a| dom::attr(a, "href"))
            .map(str::trim)
            .filter(|href| href.starts_with("http://") || href.starts_with("https://"))
            .map(str::to_string);
    }

    if url.starts_with("data:") {
        return None;
    }

    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Page;
    use scraper::Selector;

    fn with_root<T>(html: &str, f: impl FnOnce(ElementRef<'_>) -> T) -> T {
        let page = Page::parse(html, None);
        let root = page.query(&Selector::parse("#root").unwrap()).unwrap();
        f(root)
    }

    fn render(html: &str) -> String {
        with_root(html, render_markdown)
    }

    fn images(html: &str) -> Vec<String> {
        with_root(html, collect_images)
    }

    #[test]
    fn text_only_subtree_is_cleaned_concatenation() {
        let out = render("<span id='root'>Hello \n\n\n\n world<!-- note --> again </span>");
        assert_eq!(out, clean_markdown("Hello \n\n\n\n world again "));
        assert_eq!(out, "Hello\n\n world again");
    }

    #[test]
    fn paragraphs_are_separated_by_blank_lines() {
        let out = render("<div id='root'><p>Hello <strong>World</strong></p><p>Second</p></div>");
        assert_eq!(out, "Hello **World**\n\nSecond");
    }

    #[test]
    fn headings_render_as_plain_blocks() {
        assert_eq!(render("<div id='root'><h2>Title</h2><p>x</p></div>"), "Title\n\nx");
    }

    #[test]
    fn code_block_shape_before_cleaning() {
        let raw = with_root(
            "<div id='root'><pre><code class=\"language-py\">print(1)\n</code></pre></div>",
            |root| {
                let pre = dom::find_descendant_tag(root, "pre").unwrap();
                to_markdown(pre, false)
            },
        );
        assert_eq!(raw, "\n\n```python\nprint(1)\n```\n\n");
    }

    #[test]
    fn code_block_keeps_markup_as_text() {
        let out = render(
            "<div id='root'><p>Use this:</p><pre><code class=\"language-js\">if (a &lt; b) { <b>x</b>() }</code></pre></div>",
        );
        assert_eq!(out, "Use this:\n\n```javascript\nif (a < b) { x() }\n```");
    }

    #[test]
    fn pre_without_code_uses_block_text_and_no_language() {
        let out = render("<div id='root'><pre class='language-rust'>let x = 1;</pre></div>");
        assert_eq!(out, "```\nlet x = 1;\n```");
    }

    #[test]
    fn inline_code_is_trimmed_and_wrapped() {
        assert_eq!(render("<p id='root'>Run <code> ls -la </code> now</p>"), "Run `ls -la` now");
    }

    #[test]
    fn inline_code_inside_preformatted_context_is_raw() {
        let raw = with_root("<span id='root'><code> x </code></span>", |root| {
            to_markdown(root, true)
        });
        assert_eq!(raw, " x ");
    }

    #[test]
    fn emphasis_and_strong() {
        let out = render("<p id='root'><em>a</em> and <i>b</i> and <b>c</b></p>");
        assert_eq!(out, "*a* and *b* and **c**");
    }

    #[test]
    fn line_break_is_a_newline() {
        assert_eq!(render("<p id='root'>line1<br>line2</p>"), "line1\nline2");
    }

    #[test]
    fn list_items_are_dashed() {
        assert_eq!(render("<ul id='root'><li>One</li><li> Two </li></ul>"), "- One\n- Two");
    }

    #[test]
    fn links() {
        assert_eq!(
            render(r#"<p id='root'>See <a href="https://x.com/docs">docs</a></p>"#),
            "See [docs](https://x.com/docs)"
        );
        assert_eq!(
            render(r#"<p id='root'><a href="https://x.com"> </a></p>"#),
            "[https://x.com](https://x.com)"
        );
        assert_eq!(render("<p id='root'><a> plain </a></p>"), "plain");
    }

    #[test]
    fn link_wrapping_image_renders_only_the_image() {
        let out = render(
            r#"<div id='root'><a href="https://cdn.example.com/full.png"><img src="https://cdn.example.com/thumb.png" alt="chart"></a></div>"#,
        );
        assert_eq!(out, "![chart](https://cdn.example.com/thumb.png)");
    }

    #[test]
    fn image_alt_falls_back_to_image() {
        assert_eq!(
            render(r#"<p id='root'><img src="https://e.com/a.png" alt=""></p>"#),
            "![image](https://e.com/a.png)"
        );
    }

    #[test]
    fn image_source_resolution() {
        assert_eq!(
            render(r#"<p id='root'><img data-src="//cdn.e.com/lazy.webp"></p>"#),
            "![image](https://cdn.e.com/lazy.webp)"
        );
        assert_eq!(render(r#"<p id='root'>x<img src="data:image/png;base64,AAAA"></p>"#), "x");
        assert_eq!(render(r#"<p id='root'>x<img src="blob:https://chatgpt.com/1"></p>"#), "x");
    }

    #[test]
    fn blob_image_recovers_link_target() {
        let html = r#"<div id='root'><a href="https://files.example.com/full.png"><img src="blob:https://chatgpt.com/9f"></a></div>"#;
        assert_eq!(render(html), "![image](https://files.example.com/full.png)");
        assert_eq!(images(html), vec!["https://files.example.com/full.png"]);
    }

    #[test]
    fn collect_images_skips_data_urls() {
        let html = r#"<div id='root'><img src="data:image/png;base64,AAAA"><p><img src="https://e.com/b.png"></p><img src="https://e.com/b.png"></div>"#;
        assert_eq!(images(html), vec!["https://e.com/b.png", "https://e.com/b.png"]);
    }

    #[test]
    fn clean_markdown_normalizes_whitespace() {
        assert_eq!(clean_markdown("\n\n\nA  \t\nB\n\n\n\nC  "), "A\nB\n\nC");
        assert_eq!(clean_markdown(""), "");
    }

    fn nested_spans(depth: usize, inner: &str) -> String {
        format!(
            "<div id='root'>{}{inner}{}</div>",
            "<span>".repeat(depth),
            "</span>".repeat(depth)
        )
    }

    #[test]
    fn moderate_nesting_keeps_formatting() {
        assert_eq!(render(&nested_spans(100, "<b>deep</b>")), "**deep**");
    }

    #[test]
    fn deep_nesting_falls_back_to_text() {
        let html = nested_spans(20_000, "<b>deep</b> <a href='https://e.com'>link</a>");
        let out = std::thread::Builder::new()
            .stack_size(4 * 1024 * 1024)
            .spawn(move || render(&html))
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(out, "deep link");
    }
}
