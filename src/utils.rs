use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::path::PathBuf;

pub const DEFAULT_SUBFOLDER_TEMPLATE: &str = "AI Chats/{platform}/";
pub const DEFAULT_FILENAME_TEMPLATE: &str = "{platform}-{title}-{datetime}";
pub const DEFAULT_IMAGE_RELATIVE_PATH: &str = "assets/";
pub const DEFAULT_TAG: &str = "ai-chat";

const MAX_SEGMENT_CHARS: usize = 120;

static INVALID_FILE_CHARS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[\\/:*?"<>|]"#).unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static TRAILING_DOTS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.+$").unwrap());
static TEMPLATE_TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([a-zA-Z0-9_]+)\}").unwrap());
static YAML_NEEDS_QUOTES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[:#,\n\[\]{}]|^\s|\s$|^[*&!|>'"%@`]|^[-?](\s|$)"#).unwrap()
});

/// User-facing export settings, after CLI and config file have been merged.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub subfolder_template: String,
    pub filename_template: String,
    pub image_relative_path: String,
    pub include_frontmatter: bool,
    pub include_timestamps: bool,
    pub tags: Vec<String>,
    /// `auto`, `en` or `zh_CN`.
    pub ui_language: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            subfolder_template: DEFAULT_SUBFOLDER_TEMPLATE.to_string(),
            filename_template: DEFAULT_FILENAME_TEMPLATE.to_string(),
            image_relative_path: DEFAULT_IMAGE_RELATIVE_PATH.to_string(),
            include_frontmatter: true,
            include_timestamps: true,
            tags: vec![DEFAULT_TAG.to_string()],
            ui_language: "auto".to_string(),
        }
    }
}

/// Configuration required to run the export process.
/// This decouples the logic from how the arguments were parsed (CLI/Config file).
#[derive(Clone, Debug)]
pub struct ExportConfig {
    pub target_dir: PathBuf,
    pub settings: Settings,
    pub verbose: bool,
    pub quiet: bool,
}

// ── Path segments and templates ──

/// Make `raw` safe as a single file or directory name.
///
/// Reserved characters become `-`, whitespace runs collapse to one space,
/// trailing dots are dropped and the result is capped at 120 characters.
pub fn sanitize_path_segment(raw: &str, fallback: &str) -> String {
    let value = INVALID_FILE_CHARS_RE.replace_all(raw.trim(), "-");
    let value = WHITESPACE_RE.replace_all(&value, " ");
    let value = TRAILING_DOTS_RE.replace(&value, "");
    let value = value.trim();
    if value.is_empty() {
        return fallback.to_string();
    }
    value.chars().take(MAX_SEGMENT_CHARS).collect()
}

/// Values for the `{platform}`, `{title}`, `{model}`, `{date}`, `{time}` and
/// `{datetime}` template tokens. Each value is already a safe path segment.
#[derive(Clone, Debug, PartialEq)]
pub struct TemplateValues {
    pub platform: String,
    pub title: String,
    pub model: String,
    pub date: String,
    pub time: String,
    pub datetime: String,
}

impl TemplateValues {
    pub fn get(&self, token: &str) -> Option<&str> {
        match token {
            "platform" => Some(&self.platform),
            "title" => Some(&self.title),
            "model" => Some(&self.model),
            "date" => Some(&self.date),
            "time" => Some(&self.time),
            "datetime" => Some(&self.datetime),
            _ => None,
        }
    }
}

/// `at` is the local wall-clock time of the export.
pub fn build_template_values(
    platform: &str,
    title: &str,
    model: &str,
    at: NaiveDateTime,
) -> TemplateValues {
    let model = if model.is_empty() { "unknown-model" } else { model };
    TemplateValues {
        platform: sanitize_path_segment(platform, "chat"),
        title: sanitize_path_segment(title, "untitled-chat"),
        model: sanitize_path_segment(model, "unknown-model"),
        date: format_date_token(at),
        time: format_time_token(at),
        datetime: format_datetime_token(at),
    }
}

pub fn format_date_token(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%d").to_string()
}

pub fn format_time_token(at: NaiveDateTime) -> String {
    at.format("%H%M%S").to_string()
}

pub fn format_datetime_token(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%d-%H%M%S").to_string()
}

/// Substitute `{token}` placeholders. Unknown tokens render as nothing.
pub fn render_template(template: &str, values: &TemplateValues) -> String {
    TEMPLATE_TOKEN_RE
        .replace_all(template, |caps: &Captures| {
            values.get(&caps[1]).unwrap_or("").to_string()
        })
        .into_owned()
}

/// Normalize a slash-delimited relative path to `a/b/` form (empty stays empty).
/// Backslashes count as separators and blank segments are dropped.
pub fn normalize_subfolder(path: &str) -> String {
    let parts = split_relative_path(path);
    if parts.is_empty() {
        return String::new();
    }
    format!("{}/", parts.join("/"))
}

pub fn split_relative_path(path: &str) -> Vec<String> {
    path.replace('\\', "/")
        .split('/')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn ensure_markdown_extension(name: &str) -> String {
    if name.to_lowercase().ends_with(".md") {
        name.to_string()
    } else {
        format!("{name}.md")
    }
}

/// `<YYYY-MM-DD-HHMMSS>-<index+1>-<6 hex>.<ext>`
pub fn generate_image_name(index: usize, at: NaiveDateTime, ext: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}.{ext}", format_datetime_token(at), index + 1, &suffix[..6])
}

// ── YAML and display formatting ──

/// Render a frontmatter scalar: `""` when empty, JSON-quoted when it holds
/// YAML syntax characters or edge whitespace, literal otherwise.
///
/// Values starting with an indicator (`*`, `&`, `!`, quotes, `>`, `|`, `%`,
/// `@`, a backtick, or `- ` / `? `) are quoted too, since a plain scalar
/// cannot begin with one. Commas are quoted so tags survive the flow list.
pub fn escape_yaml(value: &str) -> String {
    if value.is_empty() {
        return "\"\"".to_string();
    }
    if YAML_NEEDS_QUOTES_RE.is_match(value) {
        return serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""));
    }
    value.to_string()
}

/// `2026-02-19 10:25:00Z`
pub fn format_display_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%SZ").to_string()
}
