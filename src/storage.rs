//! Writing into the export root.
//!
//! All names are resolved inside a single directory. Files are opened with
//! `create_new`, so a name taken between probing and writing moves on to the
//! next candidate. Nothing here ever overwrites an existing file.

use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::ExportError;
use crate::utils::split_relative_path;

/// Upper bound on `stem-N.ext` candidates tried before giving up.
pub const MAX_NAME_ATTEMPTS: usize = 1000;

/// Create `root` if needed and confirm files can be created in it.
pub fn ensure_writable(root: &Path) -> Result<(), ExportError> {
    fs::create_dir_all(root).map_err(|_| ExportError::PermissionDenied(root.to_path_buf()))?;

    let probe = root.join(format!(".ai-chat-export-{}", uuid::Uuid::new_v4().simple()));
    fs::write(&probe, b"").map_err(|_| ExportError::PermissionDenied(root.to_path_buf()))?;
    if let Err(e) = fs::remove_file(&probe) {
        log::warn!("could not remove write probe {}: {e}", probe.display());
    }
    Ok(())
}

/// Create (or reuse) the directory chain named by a slash-delimited relative path.
pub fn ensure_subdirectory(root: &Path, relative: &str) -> Result<PathBuf, ExportError> {
    let mut dir = root.to_path_buf();
    for part in split_relative_path(relative) {
        dir.push(part);
    }
    fs::create_dir_all(&dir)
        .map_err(|e| ExportError::io(format!("Failed to create directory {}", dir.display()), e))?;
    Ok(dir)
}

/// Candidate number `counter` for `name`: `name` itself, then `stem-N.ext`.
///
/// The extension is everything after the last dot, unless that dot is the
/// first character.
fn candidate_name(name: &str, counter: usize) -> String {
    if counter == 0 {
        return name.to_string();
    }
    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    };
    format!("{stem}-{counter}{ext}")
}

/// First free name among `name`, `stem-1.ext`, `stem-2.ext`, ...
pub fn find_available_name(dir: &Path, name: &str) -> Result<String, ExportError> {
    for counter in 0..MAX_NAME_ATTEMPTS {
        let candidate = candidate_name(name, counter);
        let taken = dir
            .join(&candidate)
            .try_exists()
            .map_err(|e| ExportError::io(format!("Failed to probe {}", dir.display()), e))?;
        if !taken {
            return Ok(candidate);
        }
    }

    Err(ExportError::NamingExhausted {
        dir: dir.to_path_buf(),
        name: name.to_string(),
    })
}

/// Create `path` and write `bytes` to it. Fails with `AlreadyExists` instead
/// of truncating a file that is already there.
fn write_new(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(bytes)
}

/// Write `bytes` under the first free variant of `name`. Returns the name used.
pub fn write_unique(dir: &Path, name: &str, bytes: &[u8]) -> Result<String, ExportError> {
    for counter in 0..MAX_NAME_ATTEMPTS {
        let candidate = candidate_name(name, counter);
        let path = dir.join(&candidate);
        match write_new(&path, bytes) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                log::debug!("{} already exists, trying next name", path.display());
            }
            Err(e) => {
                return Err(ExportError::io(format!("Failed to write {}", path.display()), e));
            }
        }
    }

    Err(ExportError::NamingExhausted {
        dir: dir.to_path_buf(),
        name: name.to_string(),
    })
}

/// Write `content` under the first free variant of `name`. Returns the name used.
pub fn write_unique_text_file(dir: &Path, name: &str, content: &str) -> Result<String, ExportError> {
    write_unique(dir, name, content.as_bytes())
}
