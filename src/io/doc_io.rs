use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::io::recovery::{RecoveryCategory, RecoveryEntry, atomic_write, log_recovery};
use crate::model::document::Document;
use crate::parse::{parse_document, parse_document_with_dropped, serialize_document};

/// Error type for task file I/O.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("background file task failed: {0}")]
    Background(#[from] tokio::task::JoinError),
}

/// Read the raw file text. A missing file is `None`, not an error.
pub fn read_text(path: &Path) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::ReadError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Load and parse the task file. A missing file is an empty document.
pub fn load_document(path: &Path) -> Result<Document, StoreError> {
    Ok(read_text(path)?
        .map(|text| parse_document(&text))
        .unwrap_or_default())
}

/// Serialize and write `doc`, returning the text written.
///
/// On failure the unsaved text goes to the recovery log before the error is
/// returned.
pub fn save_document(path: &Path, doc: &Document) -> Result<String, StoreError> {
    let content = serialize_document(doc);
    let result = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir),
        _ => Ok(()),
    }
    .and_then(|()| atomic_write(path, content.as_bytes()));

    if let Err(e) = result {
        log_recovery(
            path,
            RecoveryEntry::new(RecoveryCategory::Write, "task file write failed")
                .field("Target", path.display().to_string())
                .field("Error", e.to_string())
                .body(content),
        );
        return Err(StoreError::WriteError {
            path: path.to_path_buf(),
            source: e,
        });
    }
    Ok(content)
}

/// Log lines in `original` that a rewrite of the file will not carry over.
pub fn log_dropped_lines(path: &Path, original: &str) {
    let (_, dropped) = parse_document_with_dropped(original);
    if dropped.is_empty() {
        return;
    }
    tracing::info!(
        path = %path.display(),
        lines = dropped.len(),
        "rewrite drops lines outside the task grammar; saved to recovery log"
    );
    log_recovery(
        path,
        RecoveryEntry::new(RecoveryCategory::Parser, "dropped lines")
            .field("Source", path.display().to_string())
            .body(dropped.join("\n")),
    );
}

/// Create the file with a single `Inbox` section if it does not exist yet.
/// Returns whether it was created.
pub fn ensure_file(path: &Path) -> Result<bool, StoreError> {
    if path.exists() {
        return Ok(false);
    }
    save_document(path, &Document::with_default_section())?;
    Ok(true)
}
