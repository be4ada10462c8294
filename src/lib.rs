//! # ai-chat-export
//!
//! Export [ChatGPT](https://chatgpt.com) and [Gemini](https://gemini.google.com)
//! conversations to local Markdown files, with the images they reference saved
//! alongside.
//!
//! ## What it does
//!
//! The input is a chat page saved from the browser ("Save page as", or the
//! page HTML piped on stdin). The page is parsed read-only, each conversational
//! turn is converted from the platform's HTML to Markdown (code blocks keep
//! their language, links wrapping images collapse to the image), and the
//! result is written as one document with YAML frontmatter.
//!
//! Images are downloaded one at a time into a folder next to the document and
//! every reference to them is rewritten to the local relative path. An image
//! that cannot be fetched is reported as a warning and keeps its original URL.
//!
//! Existing files are never overwritten: a name that is taken becomes
//! `name-1.md`, `name-2.md`, and so on.
//!
//! ## Usage
//!
//! ```sh
//! # Export a saved ChatGPT page into an Obsidian vault
//! ai-chat-export ~/Downloads/chat.html ~/notes
//!
//! # Page saved without its address: pass it explicitly
//! ai-chat-export page.html ~/notes --url https://gemini.google.com/app/abc
//!
//! # Custom layout and tags
//! ai-chat-export chat.html ~/notes --subfolder "Chats/{platform}/{date}" \
//!     --filename "{title}" --tags ai-chat,work
//! ```
//!
//! Preferences can be persisted in `~/.config/ai-chat-export/config.toml`.

pub mod adapters;
pub mod dom;
pub mod error;
pub mod exporter;
pub mod i18n;
pub mod images;
pub mod language;
pub mod model;
pub mod process;
pub mod renderer;
pub mod storage;
pub mod utils;
