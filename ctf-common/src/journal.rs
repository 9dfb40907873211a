//! Append-only plain-text record files.
//!
//! Submissions, feedback and "flag retrieved" markers are each one line per
//! event. Files are opened in append mode for every write and never rotated
//! or locked; concurrent writers may interleave at the OS buffer level.

use crate::CommonError;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// A single append-only line file
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `line` plus a trailing newline, creating the parent directory
    /// and the file when they are missing.
    pub async fn append_line(&self, line: &str) -> Result<(), CommonError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');
        file.write_all(record.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}

/// Create every directory in `dirs`, ignoring failures.
pub fn ensure_dirs<P: AsRef<Path>>(dirs: &[P]) {
    for dir in dirs {
        let dir = dir.as_ref();
        if let Err(e) = std::fs::create_dir_all(dir) {
            debug!("Could not create {}: {}", dir.display(), e);
        }
    }
}

/// Replace line breaks with a literal `\n` so a record stays on one line.
pub fn escape_newlines(text: &str) -> String {
    text.replace("\r\n", "\\n")
        .replace('\r', "\\n")
        .replace('\n', "\\n")
}

/// First `max_chars` characters of `text` (not bytes).
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
