use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use scraper::Selector;

use super::{
    Platform, UNTITLED_CHAT, build_chat, first_match, page_title_without_site, parse_selectors,
    turn_message,
};
use crate::dom::{self, Page};
use crate::model::{ChatData, Message, Role};

const TITLE_MAX_CHARS: usize = 80;

static TURN_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("user-query, model-response").unwrap());

static USER_CONTENT_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    parse_selectors(&[
        r#"[data-test-id="user-query-text"]"#,
        ".query-text",
        r#"[class*="query-text"]"#,
        ".user-query-text",
    ])
});

static ASSISTANT_CONTENT_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    parse_selectors(&[
        r#"[data-test-id="model-response-text"]"#,
        ".model-response-text",
        r#"[class*="response-content"]"#,
        ".response-content",
        ".markdown",
    ])
});

static MODEL_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    parse_selectors(&[
        r#"[data-test-id="model-selector-button"]"#,
        r#"button[aria-label*="model" i]"#,
        r#"[class*="model-name"]"#,
    ])
});

pub(super) fn extract(page: &Page, now: DateTime<Utc>) -> ChatData {
    let messages: Vec<Message> = page
        .select_all(&TURN_SELECTOR)
        .into_iter()
        .filter_map(|turn| {
            let (role, candidates) = if dom::tag_name(turn) == "user-query" {
                (Role::User, &*USER_CONTENT_SELECTORS)
            } else {
                (Role::Assistant, &*ASSISTANT_CONTENT_SELECTORS)
            };
            let content = first_match(turn, candidates).unwrap_or(turn);
            turn_message(role, content, now)
        })
        .collect();

    let title = title(page, &messages);
    build_chat(Platform::Gemini, page, title, model(page), messages, now)
}

/// The first user prompt on one line, capped at 80 characters.
fn title(page: &Page, messages: &[Message]) -> String {
    let first_prompt = messages
        .iter()
        .find(|m| m.role == Role::User)
        .map(|m| m.markdown_content.as_str())
        .unwrap_or("");

    let title = if first_prompt.is_empty() {
        page_title_without_site(page)
    } else {
        first_prompt
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .take(TITLE_MAX_CHARS)
            .collect()
    };

    if title.is_empty() {
        UNTITLED_CHAT.to_string()
    } else {
        title
    }
}

fn model(page: &Page) -> String {
    MODEL_SELECTORS
        .iter()
        .filter_map(|selector| page.query(selector))
        .map(|el| dom::text_content(el).trim().to_string())
        .find(|text| !text.is_empty())
        .unwrap_or_else(|| "gemini".to_string())
}
