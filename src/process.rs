use crate::adapters::Platform;
use crate::dom::Page;
use crate::error::ExportError;
use crate::exporter;
use crate::i18n::I18n;
use crate::images::{self, ImageFetcher, ImageTarget};
use crate::model::ChatData;
use crate::storage;
use crate::utils::{
    ExportConfig, build_template_values, ensure_markdown_extension, normalize_subfolder,
    render_template, sanitize_path_segment,
};
use chrono::{DateTime, Local, Utc};
use std::path::PathBuf;

/// What a finished export produced.
#[derive(Debug)]
pub struct ExportReport {
    /// Written file, relative to the export root (`AI Chats/chatgpt/x.md`).
    pub path: String,
    pub absolute_path: PathBuf,
    pub warnings: Vec<String>,
    pub messages: usize,
    pub images_saved: usize,
}

/// Detect the platform and pull the conversation out of the page.
pub fn extract(page: &Page, now: DateTime<Utc>) -> Result<ChatData, ExportError> {
    let platform = Platform::detect(page).ok_or_else(|| {
        let href = page.href();
        ExportError::UnsupportedPage(if href.is_empty() {
            "unknown address (use --url)".to_string()
        } else {
            href
        })
    })?;
    log::debug!("using {platform} adapter for {}", page.href());
    Ok(platform.extract_at(page, now))
}

/// The main entry point for the business logic: extract, then export.
pub fn run(
    page: &Page,
    config: &ExportConfig,
    fetcher: &dyn ImageFetcher,
    i18n: &I18n,
    now: DateTime<Local>,
) -> Result<ExportReport, ExportError> {
    let chat = extract(page, now.with_timezone(&Utc))?;
    export_chat(&chat, config, fetcher, i18n, now)
}

/// Write `chat` and its images under `config.target_dir`.
///
/// Steps run in a fixed order: permission probe, folder creation, document
/// assembly, image download and rewrite, then the unique-name Markdown write.
pub fn export_chat(
    chat: &ChatData,
    config: &ExportConfig,
    fetcher: &dyn ImageFetcher,
    i18n: &I18n,
    now: DateTime<Local>,
) -> Result<ExportReport, ExportError> {
    if chat.messages.is_empty() {
        return Err(ExportError::NothingToExport);
    }

    let settings = &config.settings;
    storage::ensure_writable(&config.target_dir)?;

    let local = now.naive_local();
    let values = build_template_values(&chat.platform, &chat.title, &chat.metadata.model, local);

    let subfolder = normalize_subfolder(&render_template(&settings.subfolder_template, &values));
    let document_dir = storage::ensure_subdirectory(&config.target_dir, &subfolder)?;

    let base_name = sanitize_path_segment(
        &render_template(&settings.filename_template, &values),
        "chat-export",
    );
    let markdown_name = ensure_markdown_extension(&base_name);

    let markdown = exporter::assemble(chat, settings);

    let outcome = images::materialize_images(
        markdown,
        &chat.unique_image_urls(),
        &ImageTarget {
            document_dir: &document_dir,
            relative_path: &settings.image_relative_path,
            at: local,
            quiet: config.quiet,
        },
        fetcher,
        i18n,
    )?;

    let final_name = storage::write_unique_text_file(&document_dir, &markdown_name, &outcome.markdown)?;
    if config.verbose {
        eprintln!("Created: {subfolder}{final_name}");
    }

    Ok(ExportReport {
        path: format!("{subfolder}{final_name}"),
        absolute_path: document_dir.join(&final_name),
        warnings: outcome.warnings,
        messages: chat.messages.len(),
        images_saved: outcome.saved,
    })
}
