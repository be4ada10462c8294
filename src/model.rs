//! Type definitions for an extracted conversation.
//!
//! A `ChatData` value is built once per export by one of the platform
//! adapters and consumed by the document assembler. Field names serialize in
//! camelCase so `--emit-json` output matches what the page-side extractor
//! produces.
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Who produced a conversational turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Unknown,
}

impl Role {
    /// Map a platform role marker (`data-message-author-role` and friends).
    pub fn from_marker(marker: &str) -> Self {
        match marker.trim().to_ascii_lowercase().as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            _ => Role::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// One conversational turn.
///
/// `images` holds every image URL referenced by the turn in document order.
/// Duplicates are kept here; the image step deduplicates across the chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    pub markdown_content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl Message {
    /// A turn with neither text nor images is not worth exporting.
    pub fn is_empty(&self) -> bool {
        self.markdown_content.is_empty() && self.images.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMetadata {
    pub exported_at: DateTime<Utc>,
    /// Model label scraped from the page. Empty means unknown.
    #[serde(default)]
    pub model: String,
    pub total_messages: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatData {
    pub platform: String,
    pub url: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub metadata: ChatMetadata,
}

impl ChatData {
    /// Distinct image URLs across all messages, in order of first appearance.
    pub fn unique_image_urls(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.messages
            .iter()
            .flat_map(|m| m.images.iter())
            .filter(|url| !url.is_empty())
            .filter(|url| seen.insert(url.as_str()))
            .cloned()
            .collect()
    }
}
