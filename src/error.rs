use std::path::PathBuf;

use thiserror::Error;

/// Ways an export can stop before a Markdown file is written.
///
/// Per-image problems are never represented here; they end up as warnings in
/// the export report.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unsupported page: {0}")]
    UnsupportedPage(String),

    #[error("no chat messages found")]
    NothingToExport,

    #[error("cannot write to {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("too many conflicting file names for {name} in {}", .dir.display())]
    NamingExhausted { dir: PathBuf, name: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ExportError::Io {
            context: context.into(),
            source,
        }
    }
}
