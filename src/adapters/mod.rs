//! Platform adapters: turn a saved chat page into [`ChatData`].
//!
//! Each supported site is a [`Platform`] variant. Detection walks
//! [`Platform::ALL`] in order and picks the first variant whose host matches
//! the page address exactly.

mod chatgpt;
mod gemini;

use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::dom::{self, Page};
use crate::model::{ChatData, ChatMetadata, Message, Role};
use crate::renderer;

pub const UNTITLED_CHAT: &str = "Untitled Chat";

// "Chat name - ChatGPT" / "Chat name | Gemini": drop everything from the first separator.
static SITE_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*[-|].*$").unwrap());

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    ChatGpt,
    Gemini,
}

impl Platform {
    /// Probe order used by [`Platform::detect`].
    pub const ALL: [Platform; 2] = [Platform::ChatGpt, Platform::Gemini];

    /// Identifier used in frontmatter and the `{platform}` template token.
    pub fn name(self) -> &'static str {
        match self {
            Platform::ChatGpt => "chatgpt",
            Platform::Gemini => "gemini",
        }
    }

    pub fn host(self) -> &'static str {
        match self {
            Platform::ChatGpt => "chatgpt.com",
            Platform::Gemini => "gemini.google.com",
        }
    }

    pub fn detect(page: &Page) -> Option<Platform> {
        Self::ALL.into_iter().find(|p| p.is_supported(page))
    }

    pub fn is_supported(self, page: &Page) -> bool {
        page.host() == Some(self.host())
    }

    pub fn extract_chat_data(self, page: &Page) -> ChatData {
        self.extract_at(page, Utc::now())
    }

    /// Extract with a fixed clock. Every message and `exported_at` get `now`.
    pub fn extract_at(self, page: &Page, now: DateTime<Utc>) -> ChatData {
        match self {
            Platform::ChatGpt => chatgpt::extract(page, now),
            Platform::Gemini => gemini::extract(page, now),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Shared extraction helpers ──

/// Render one turn. `None` when it has neither text nor images.
fn turn_message(role: Role, content: ElementRef<'_>, now: DateTime<Utc>) -> Option<Message> {
    let message = Message {
        role,
        markdown_content: renderer::render_markdown(content),
        timestamp: now,
        images: renderer::collect_images(content),
    };
    if message.is_empty() {
        log::debug!("skipping empty {role} turn");
        return None;
    }
    Some(message)
}

/// First descendant of `turn` matching one of `selectors`, tried in order.
fn first_match<'a>(turn: ElementRef<'a>, selectors: &[Selector]) -> Option<ElementRef<'a>> {
    selectors
        .iter()
        .find_map(|selector| dom::query_descendant(turn, selector))
}

/// The document title without a trailing " - Site" / " | Site" part.
fn page_title_without_site(page: &Page) -> String {
    SITE_SUFFIX_RE.replace(&page.title(), "").trim().to_string()
}

fn parse_selectors(list: &[&str]) -> Vec<Selector> {
    list.iter().map(|css| Selector::parse(css).unwrap()).collect()
}

fn build_chat(
    platform: Platform,
    page: &Page,
    title: String,
    model: String,
    messages: Vec<Message>,
    now: DateTime<Utc>,
) -> ChatData {
    log::debug!(
        "{platform}: extracted {} messages, model {model:?}",
        messages.len()
    );
    ChatData {
        platform: platform.name().to_string(),
        url: page.href(),
        title,
        metadata: ChatMetadata {
            exported_at: now,
            model,
            total_messages: messages.len(),
        },
        messages,
    }
}
