use ai_chat_export::dom::Page;
use ai_chat_export::error::ExportError;
use ai_chat_export::i18n::{self, I18n, Locale};
use ai_chat_export::images::HttpFetcher;
use ai_chat_export::process;
use ai_chat_export::utils::{ExportConfig, Settings};
use chrono::{Local, Utc};
use clap::Parser;
use eyre::{Context, Result, eyre};
use serde::Deserialize;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use url::Url;

/// Export ChatGPT and Gemini conversations from saved chat pages to Markdown.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Saved chat page (HTML). Use "-" to read from stdin.
    #[arg(value_name = "PAGE")]
    page: PathBuf,

    /// Root directory to export into.
    /// Defaults to ./ai-chat-export if not set in config.
    #[arg(value_name = "TARGET_DIR")]
    target_dir: Option<PathBuf>,

    /// Address the page was saved from.
    /// Detected from the saved page if omitted.
    #[arg(long, value_name = "URL")]
    url: Option<Url>,

    /// Path to a specific configuration file.
    /// Defaults to $XDG_CONFIG_HOME/ai-chat-export/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Subfolder template, e.g. "AI Chats/{platform}/".
    #[arg(long, value_name = "TEMPLATE")]
    subfolder: Option<String>,

    /// File name template, e.g. "{platform}-{title}-{datetime}".
    #[arg(long, value_name = "TEMPLATE")]
    filename: Option<String>,

    /// Image folder relative to the exported file.
    #[arg(long, value_name = "PATH")]
    image_path: Option<String>,

    /// Do not write YAML frontmatter.
    #[arg(long)]
    no_frontmatter: bool,

    /// Do not write per-message timestamps.
    #[arg(long)]
    no_timestamps: bool,

    /// Comma-separated tags to add to frontmatter (e.g. "ai-chat,work").
    #[arg(long, value_name = "TAGS", value_delimiter = ',')]
    tags: Option<Vec<String>>,

    /// Message language: auto, en or zh_CN.
    #[arg(long, value_name = "LANG")]
    lang: Option<String>,

    /// Print the extracted conversation as JSON and write nothing.
    #[arg(long)]
    emit_json: bool,

    /// Print each file written and debug logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress progress bars and the summary line.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Deserialize, Default)]
struct FileConfig {
    target_dir: Option<PathBuf>,
    subfolder_template: Option<String>,
    filename_template: Option<String>,
    image_relative_path: Option<String>,
    include_frontmatter: Option<bool>,
    include_timestamps: Option<bool>,
    tags: Option<Vec<String>>,
    ui_language: Option<String>,
}

fn load_file_config(explicit_path: Option<&Path>) -> Result<FileConfig> {
    let path = if let Some(p) = explicit_path {
        if !p.exists() {
            return Err(eyre!("Config file not found: {}", p.display()));
        }
        Some(p.to_path_buf())
    } else {
        dirs::config_dir()
            .map(|d| d.join("ai-chat-export/config.toml"))
            .filter(|p| p.exists())
    };

    match path {
        None => Ok(FileConfig::default()),
        Some(p) => {
            let content = fs::read_to_string(&p)
                .wrap_err_with(|| format!("Failed to read config: {}", p.display()))?;
            toml::from_str(&content)
                .wrap_err_with(|| format!("Failed to parse config: {}", p.display()))
        }
    }
}

fn read_page(path: &Path) -> Result<String> {
    let bytes = if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .wrap_err("Failed to read page from stdin")?;
        buf
    } else {
        fs::read(path).wrap_err_with(|| format!("Failed to read page: {}", path.display()))?
    };
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    // 1. Load config file (CLI path > default path)
    let file_cfg = load_file_config(cli.config.as_deref())?;

    // 2. Merge settings (CLI > Config > Default)
    let defaults = Settings::default();
    let settings = Settings {
        subfolder_template: cli
            .subfolder
            .or(file_cfg.subfolder_template)
            .unwrap_or(defaults.subfolder_template),
        filename_template: cli
            .filename
            .or(file_cfg.filename_template)
            .unwrap_or(defaults.filename_template),
        image_relative_path: cli
            .image_path
            .or(file_cfg.image_relative_path)
            .unwrap_or(defaults.image_relative_path),
        include_frontmatter: !cli.no_frontmatter
            && file_cfg.include_frontmatter.unwrap_or(defaults.include_frontmatter),
        include_timestamps: !cli.no_timestamps
            && file_cfg.include_timestamps.unwrap_or(defaults.include_timestamps),
        tags: cli.tags.or(file_cfg.tags).unwrap_or(defaults.tags),
        ui_language: cli
            .lang
            .or(file_cfg.ui_language)
            .unwrap_or(defaults.ui_language),
    };

    let env_lang = i18n::env_language();
    let i18n = I18n::new(Locale::resolve(&settings.ui_language, env_lang.as_deref()));

    // 3. Parse the page
    let html = read_page(&cli.page)?;
    let page = Page::parse(&html, cli.url);

    if cli.emit_json {
        let chat = process::extract(&page, Utc::now())?;
        let json = serde_json::to_string_pretty(&chat).wrap_err("Failed to serialize chat")?;
        println!("{json}");
        return Ok(());
    }

    // 4. Resolve target_dir (CLI > Config > Default)
    let target_dir = cli
        .target_dir
        .or(file_cfg.target_dir)
        .unwrap_or_else(|| PathBuf::from("ai-chat-export"));

    let config = ExportConfig {
        target_dir,
        settings,
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    // 5. Run the export
    let fetcher = HttpFetcher::new(page.url().cloned());
    match process::run(&page, &config, &fetcher, &i18n, Local::now()) {
        Ok(report) => {
            for warning in &report.warnings {
                eprintln!("Warning: {warning}");
            }
            if !config.quiet {
                let summary = if report.warnings.is_empty() {
                    i18n.t(i18n::EXPORT_OK, &[&report.path])
                } else {
                    let count = report.warnings.len().to_string();
                    i18n.t(i18n::EXPORT_OK_WITH_WARNINGS, &[&report.path, &count])
                };
                eprintln!(
                    "{summary} ({} messages, {} images)",
                    report.messages, report.images_saved
                );
            }
            Ok(())
        }
        Err(ExportError::NothingToExport) => {
            eprintln!("{}", i18n.t(i18n::NO_MESSAGES, &[]));
            Ok(())
        }
        Err(ExportError::PermissionDenied(dir)) => Err(eyre!(
            "{}",
            i18n.t(i18n::PERMISSION_DENIED, &[&dir.display().to_string()])
        )),
        Err(ExportError::UnsupportedPage(address)) => {
            Err(eyre!("{}", i18n.t(i18n::UNSUPPORTED_PAGE, &[&address])))
        }
        Err(e) => Err(eyre!("{}", i18n.t(i18n::EXPORT_FAILED, &[&e.to_string()]))),
    }
}
