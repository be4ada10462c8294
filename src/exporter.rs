use crate::adapters::UNTITLED_CHAT;
use crate::model::{ChatData, Message};
use crate::utils::{Settings, escape_yaml, format_display_timestamp};
use chrono::SecondsFormat;

/// Scalar fields written between the `---` fences, in output order.
struct Frontmatter<'a> {
    title: &'a str,
    platform: &'a str,
    url: &'a str,
    exported_at: String,
    model: &'a str,
    total_messages: usize,
    tags: &'a [String],
}

impl<'a> Frontmatter<'a> {
    fn new(chat: &'a ChatData, tags: &'a [String]) -> Self {
        let model = if chat.metadata.model.is_empty() {
            "unknown"
        } else {
            chat.metadata.model.as_str()
        };
        Self {
            title: &chat.title,
            platform: &chat.platform,
            url: &chat.url,
            exported_at: chat
                .metadata
                .exported_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            model,
            total_messages: chat.messages.len(),
            tags,
        }
    }

    fn render(&self) -> String {
        let fields = [
            ("title", self.title.to_string()),
            ("platform", self.platform.to_string()),
            ("url", self.url.to_string()),
            ("exportedAt", self.exported_at.clone()),
            ("model", self.model.to_string()),
            ("totalMessages", self.total_messages.to_string()),
        ];

        let mut out = String::from("---\n");
        for (key, value) in fields {
            out.push_str(&format!("{key}: {}\n", escape_yaml(&value)));
        }
        let tags: Vec<String> = self.tags.iter().map(|t| escape_yaml(t)).collect();
        out.push_str(&format!("tags: [{}]\n", tags.join(", ")));
        out.push_str("---\n");
        out
    }
}

fn render_message(message: &Message, include_timestamps: bool) -> String {
    let role = message.role.as_str();
    let heading = if include_timestamps {
        format!(
            "**Time**: {} | **Role**: {role}",
            format_display_timestamp(message.timestamp)
        )
    } else {
        format!("**Role**: {role}")
    };
    format!("{heading}\n\n{}\n\n---\n", message.markdown_content)
}

/// Build the final Markdown document for a chat.
///
/// Layout: optional frontmatter, `# <title>`, then one block per message
/// closed by a `---` rule. The result is trimmed and ends with exactly one
/// newline.
pub fn assemble(chat: &ChatData, settings: &Settings) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(chat.messages.len() + 3);

    if settings.include_frontmatter {
        parts.push(Frontmatter::new(chat, &settings.tags).render());
    }

    let title = if chat.title.is_empty() {
        UNTITLED_CHAT
    } else {
        chat.title.as_str()
    };
    parts.push(format!("# {title}"));
    parts.push(String::new());

    for message in &chat.messages {
        parts.push(render_message(message, settings.include_timestamps));
    }

    format!("{}\n", parts.join("\n").trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChatMetadata, Role};
    use chrono::{TimeZone, Utc};

    fn chat() -> ChatData {
        let msg = |role, secs, text: &str| Message {
            role,
            markdown_content: text.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 2, 19, 10, 25, secs).unwrap(),
            images: Vec::new(),
        };
        ChatData {
            platform: "chatgpt".into(),
            url: "https://chatgpt.com/c/test".into(),
            title: "Test Chat".into(),
            messages: vec![msg(Role::User, 0, "Hello"), msg(Role::Assistant, 10, "World")],
            metadata: ChatMetadata {
                exported_at: Utc.with_ymd_and_hms(2026, 2, 19, 10, 30, 0).unwrap(),
                model: "GPT-4".into(),
                total_messages: 2,
            },
        }
    }

    #[test]
    fn full_document_layout() {
        let expected = "\
---
title: Test Chat
platform: chatgpt
url: \"https://chatgpt.com/c/test\"
exportedAt: \"2026-02-19T10:30:00.000Z\"
model: GPT-4
totalMessages: 2
tags: [ai-chat]
---

# Test Chat

**Time**: 2026-02-19 10:25:00Z | **Role**: user

Hello

---

**Time**: 2026-02-19 10:25:10Z | **Role**: assistant

World

---
";
        assert_eq!(assemble(&chat(), &Settings::default()), expected);
    }

    #[test]
    fn omits_frontmatter_and_timestamps_when_disabled() {
        let settings = Settings {
            include_frontmatter: false,
            include_timestamps: false,
            ..Settings::default()
        };
        let markdown = assemble(&chat(), &settings);
        assert!(!markdown.starts_with("---"));
        assert!(markdown.starts_with("# Test Chat\n\n**Role**: user\n\nHello"));
        assert!(!markdown.contains("**Time**:"));
        assert!(markdown.contains("**Role**: assistant"));
    }

    #[test]
    fn empty_chat_gets_defaults() {
        let mut chat = chat();
        chat.title.clear();
        chat.messages.clear();
        chat.metadata.model.clear();
        let settings = Settings {
            tags: vec!["ai-chat".into(), "work: notes".into()],
            ..Settings::default()
        };

        let markdown = assemble(&chat, &settings);
        assert!(markdown.contains("title: \"\"\n"));
        assert!(markdown.contains("model: unknown\n"));
        assert!(markdown.contains("totalMessages: 0\n"));
        assert!(markdown.contains("tags: [ai-chat, \"work: notes\"]\n"));
        assert!(markdown.ends_with("---\n\n# Untitled Chat\n"));
    }

    #[test]
    fn frontmatter_is_valid_yaml() {
        let mut chat = chat();
        chat.title = "C# [draft]: {notes} ".into();
        let markdown = assemble(&chat, &Settings::default());
        let yaml = markdown
            .strip_prefix("---\n")
            .and_then(|rest| rest.split("\n---\n").next())
            .unwrap();

        let parsed: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed["title"].as_str(), Some("C# [draft]: {notes} "));
        assert_eq!(parsed["totalMessages"].as_u64(), Some(2));
        assert_eq!(parsed["tags"][0].as_str(), Some("ai-chat"));
    }

    #[test]
    fn titles_and_tags_starting_with_indicators_parse() {
        let settings = Settings {
            tags: vec!["*star".into(), "a, b".into(), "- dash".into()],
            ..Settings::default()
        };
        for title in [
            "*Important* question",
            "&ref",
            "!note",
            "> quote",
            "@bot help",
            "`ls` output",
            "- list",
        ] {
            let mut chat = chat();
            chat.title = title.into();
            let markdown = assemble(&chat, &settings);
            let yaml = markdown
                .strip_prefix("---\n")
                .and_then(|rest| rest.split("\n---\n").next())
                .unwrap();

            let parsed: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
            assert_eq!(parsed["title"].as_str(), Some(title));
            assert_eq!(parsed["tags"][0].as_str(), Some("*star"));
            assert_eq!(parsed["tags"][1].as_str(), Some("a, b"));
            assert_eq!(parsed["tags"][2].as_str(), Some("- dash"));
        }
    }
}
