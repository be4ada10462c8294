use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use scraper::Selector;

use super::{
    Platform, UNTITLED_CHAT, build_chat, first_match, page_title_without_site, parse_selectors,
    turn_message,
};
use crate::dom::{self, Page};
use crate::model::{ChatData, Role};

static TURN_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[data-message-author-role]").unwrap());

static CONTENT_SELECTORS: Lazy<Vec<Selector>> =
    Lazy::new(|| parse_selectors(&[".markdown", "[data-message-content]"]));

static HEADING_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());

static MODEL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"[data-testid="model-switcher-dropdown-button"]"#).unwrap());

pub(super) fn extract(page: &Page, now: DateTime<Utc>) -> ChatData {
    let messages = page
        .select_all(&TURN_SELECTOR)
        .into_iter()
        .filter_map(|turn| {
            let role = Role::from_marker(dom::attr(turn, "data-message-author-role").unwrap_or(""));
            let content = first_match(turn, &CONTENT_SELECTORS).unwrap_or(turn);
            turn_message(role, content, now)
        })
        .collect();

    build_chat(Platform::ChatGpt, page, title(page), model(page), messages, now)
}

fn title(page: &Page) -> String {
    let from_title = page_title_without_site(page);
    if !from_title.is_empty() {
        return from_title;
    }
    page.query(&HEADING_SELECTOR)
        .map(|h1| dom::text_content(h1).trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED_CHAT.to_string())
}

fn model(page: &Page) -> String {
    page.query(&MODEL_SELECTOR)
        .map(|el| dom::text_content(el).trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
