//! Download referenced images next to the exported document and point the
//! Markdown at the local copies.
//!
//! Images are handled one at a time. A failure for one URL becomes a warning
//! and leaves that URL untouched in the text; the document is still written.

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDateTime;
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use regex::Regex;
use thiserror::Error;
use url::Url;

use crate::error::ExportError;
use crate::i18n::{self, I18n};
use crate::storage;
use crate::utils::{DEFAULT_IMAGE_RELATIVE_PATH, generate_image_name, normalize_subfolder};

const USER_AGENT: &str = concat!("ai-chat-export/", env!("CARGO_PKG_VERSION"));
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_IMAGE_BYTES: u64 = 32 * 1024 * 1024;
const FALLBACK_EXTENSION: &str = "png";

static URL_EXTENSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.([a-zA-Z0-9]{2,5})(\?|$)").unwrap());

/// Characters `encodeURI` leaves alone, besides ASCII alphanumerics.
const ENCODE_URI: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b';')
    .remove(b',')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'#');

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    /// Lowercased `Content-Type`, empty when the server sent none.
    pub content_type: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// The request never got a response: DNS, connect, TLS, timeout.
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("{0}")]
    Other(String),
}

/// Source of image bytes. The CLI uses [`HttpFetcher`]; tests plug in stubs.
pub trait ImageFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError>;
}

/// Blocking HTTP fetcher. Relative URLs are resolved against the page address.
pub struct HttpFetcher {
    agent: ureq::Agent,
    base: Option<Url>,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(base: Option<Url>) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(FETCH_TIMEOUT))
            .user_agent(USER_AGENT)
            .build()
            .into();
        Self {
            agent,
            base,
            max_bytes: MAX_IMAGE_BYTES,
        }
    }

    /// Reject bodies longer than `max_bytes` instead of the default 32 MiB.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn too_large(&self) -> FetchError {
        FetchError::Other(format!("image larger than {}", format_size(self.max_bytes)))
    }

    fn absolute(&self, url: &str) -> Result<Url, FetchError> {
        match Url::parse(url) {
            Ok(parsed) => Ok(parsed),
            Err(url::ParseError::RelativeUrlWithoutBase) => self
                .base
                .as_ref()
                .ok_or_else(|| FetchError::Other("relative URL and no page address".to_string()))?
                .join(url)
                .map_err(|e| FetchError::Other(e.to_string())),
            Err(e) => Err(FetchError::Other(e.to_string())),
        }
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError> {
        let target = self.absolute(url)?;
        let mut response = self.agent.get(target.as_str()).call().map_err(classify)?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(FetchError::Status(status));
        }

        let declared = header_string(&response, "content-length").parse::<u64>().ok();
        if declared.is_some_and(|len| len > self.max_bytes) {
            return Err(self.too_large());
        }

        let content_type = header_string(&response, "content-type");
        let mut bytes = Vec::new();
        response
            .body_mut()
            .as_reader()
            .take(self.max_bytes + 1)
            .read_to_end(&mut bytes)
            .map_err(|e| FetchError::Network(e.to_string()))?;
        if bytes.len() as u64 > self.max_bytes {
            return Err(self.too_large());
        }

        Ok(FetchedImage {
            bytes,
            content_type,
        })
    }
}

fn format_size(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{} MiB", bytes / MIB)
    } else {
        format!("{bytes} bytes")
    }
}

fn classify(err: ureq::Error) -> FetchError {
    let message = err.to_string();
    match err {
        ureq::Error::StatusCode(code) => FetchError::Status(code),
        ureq::Error::Io(_)
        | ureq::Error::HostNotFound
        | ureq::Error::ConnectionFailed
        | ureq::Error::Timeout(_) => FetchError::Network(message),
        _ => FetchError::Other(message),
    }
}

fn header_string(response: &ureq::http::Response<ureq::Body>, key: &str) -> String {
    response
        .headers()
        .get(key)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase()
}

// ---------------------------------------------------------------------------
// Naming and rewriting
// ---------------------------------------------------------------------------

/// Pick a file extension: content type first, then the URL, then the bytes.
pub fn infer_image_extension(url: &str, content_type: &str, bytes: &[u8]) -> String {
    let content_type = content_type.to_ascii_lowercase();
    if content_type.contains("png") {
        return "png".to_string();
    }
    if content_type.contains("jpeg") || content_type.contains("jpg") {
        return "jpg".to_string();
    }
    if content_type.contains("webp") {
        return "webp".to_string();
    }

    if let Some(caps) = URL_EXTENSION_RE.captures(url) {
        return caps[1].to_lowercase();
    }

    infer::get(bytes)
        .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
        .map(|kind| kind.extension().to_string())
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

/// The spellings a URL may take in rendered Markdown: as written,
/// percent-decoded, `encodeURI`-encoded and with `&` HTML-escaped.
pub fn url_variants(url: &str) -> Vec<String> {
    let mut variants = vec![url.to_string()];
    let mut push = |v: String| {
        if !v.is_empty() && !variants.contains(&v) {
            variants.push(v);
        }
    };

    if let Ok(decoded) = percent_decode_str(url).decode_utf8() {
        push(decoded.into_owned());
    }
    push(utf8_percent_encode(url, ENCODE_URI).to_string());
    push(url.replace('&', "&amp;"));
    variants
}

pub fn replace_all_image_url_variants(markdown: &str, url: &str, replacement: &str) -> String {
    url_variants(url)
        .iter()
        .filter(|v| !v.is_empty())
        .fold(markdown.to_string(), |acc, variant| {
            acc.replace(variant.as_str(), replacement)
        })
}

// ---------------------------------------------------------------------------
// Materialization
// ---------------------------------------------------------------------------

/// Where downloaded images go.
pub struct ImageTarget<'a> {
    /// Directory holding the Markdown file.
    pub document_dir: &'a Path,
    /// Image folder relative to `document_dir`, slash-delimited.
    pub relative_path: &'a str,
    /// Local export time, used in image file names.
    pub at: NaiveDateTime,
    pub quiet: bool,
}

#[derive(Debug, Default)]
pub struct ImageOutcome {
    pub markdown: String,
    pub warnings: Vec<String>,
    pub saved: usize,
}

#[derive(Debug, Error)]
enum ImageFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] ExportError),
}

/// Fetch each distinct URL, save it under a unique name and rewrite every
/// spelling of the URL in `markdown` to the local relative path.
///
/// Only failing to create the image folder is an error; everything per-image
/// is reported through `warnings`.
pub fn materialize_images(
    markdown: String,
    urls: &[String],
    target: &ImageTarget<'_>,
    fetcher: &dyn ImageFetcher,
    i18n: &I18n,
) -> Result<ImageOutcome, ExportError> {
    let mut unique: Vec<&str> = Vec::new();
    for url in urls.iter().map(String::as_str).filter(|u| !u.is_empty()) {
        if !unique.contains(&url) {
            unique.push(url);
        }
    }

    let mut outcome = ImageOutcome {
        markdown,
        ..ImageOutcome::default()
    };
    if unique.is_empty() {
        return Ok(outcome);
    }

    let relative = if target.relative_path.trim().is_empty() {
        DEFAULT_IMAGE_RELATIVE_PATH
    } else {
        target.relative_path
    };
    let image_dir = storage::ensure_subdirectory(target.document_dir, relative)?;
    let link_prefix = normalize_subfolder(relative);

    let pb = progress_bar(unique.len() as u64, target.quiet);

    for (index, url) in unique.iter().enumerate() {
        match save_image(index, url, &image_dir, target.at, fetcher) {
            Ok(file_name) => {
                log::debug!("saved {url} as {file_name}");
                let replacement = format!("{link_prefix}{file_name}");
                outcome.markdown =
                    replace_all_image_url_variants(&outcome.markdown, url, &replacement);
                outcome.saved += 1;
            }
            Err(failure) => {
                log::warn!("image {url} not saved: {failure}");
                let warning = match failure {
                    ImageFailure::Fetch(FetchError::Network(_)) => {
                        format!("{}: {url}", i18n.t(i18n::IMAGE_CORS_WARNING, &[]))
                    }
                    other => format!("Image download failed: {url} ({other})"),
                };
                outcome.warnings.push(warning);
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(outcome)
}

fn save_image(
    index: usize,
    url: &str,
    image_dir: &Path,
    at: NaiveDateTime,
    fetcher: &dyn ImageFetcher,
) -> Result<String, ImageFailure> {
    let image = fetcher.fetch(url)?;
    let ext = infer_image_extension(url, &image.content_type, &image.bytes);
    let base_name = generate_image_name(index, at, &ext);
    Ok(storage::write_unique(image_dir, &base_name, &image.bytes)?)
}

fn progress_bar(total: u64, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} images")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    bar
}
