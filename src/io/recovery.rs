use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;

/// Header written at the top of a new recovery log.
const FILE_HEADER: &str = "\
<!-- zuri recovery log: append-only
     Lines zuri could not keep in the task file, and rewrites that failed.
     View with: zuri recovery
     Safe to delete once you have checked it. -->

---
";

/// Why text ended up in the recovery log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryCategory {
    /// Lines the parser ignored, dropped by a rewrite
    Parser,
    /// A rewrite that could not be written
    Write,
}

impl fmt::Display for RecoveryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryCategory::Parser => write!(f, "parser"),
            RecoveryCategory::Write => write!(f, "write"),
        }
    }
}

/// One appended block: header line, `Key: value` fields, fenced body.
#[derive(Debug, Clone)]
pub struct RecoveryEntry {
    pub timestamp: DateTime<Utc>,
    pub category: RecoveryCategory,
    pub description: String,
    pub fields: Vec<(String, String)>,
    pub body: String,
}

impl RecoveryEntry {
    pub fn new(category: RecoveryCategory, description: impl Into<String>) -> Self {
        RecoveryEntry {
            timestamp: Utc::now(),
            category,
            description: description.into(),
            fields: Vec::new(),
            body: String::new(),
        }
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    fn render(&self) -> String {
        let mut out = format!(
            "## {} | {}: {}\n\n",
            self.timestamp
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            self.category,
            self.description,
        );

        out.extend(self.fields.iter().map(|(k, v)| format!("{}: {}\n", k, v)));

        if !self.body.is_empty() {
            out.push_str("\n```text\n");
            out.push_str(&self.body);
            if !self.body.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("```\n");
        }

        out.push_str("\n---\n");
        out
    }
}

/// Recovery log for a task file: `.<file name>.recovery.log` beside it.
pub fn recovery_log_path(doc_path: &Path) -> PathBuf {
    let name = doc_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tasks.md".to_string());
    let dir = doc_path.parent().unwrap_or(Path::new("."));
    dir.join(format!(".{}.recovery.log", name))
}

/// Replace `path` with `content` via a sibling temp file and a rename, so
/// readers never see a half-written file.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Append a recovery entry to the log. Failures are logged, never returned.
pub fn log_recovery(doc_path: &Path, entry: RecoveryEntry) {
    let log_path = recovery_log_path(doc_path);
    if let Err(e) = append_entry(&log_path, &entry) {
        tracing::warn!(path = %log_path.display(), error = %e, "could not write recovery log");
    }
}

fn append_entry(log_path: &Path, entry: &RecoveryEntry) -> io::Result<()> {
    let needs_header = std::fs::metadata(log_path).map_or(true, |m| m.len() == 0);
    let mut file = OpenOptions::new().create(true).append(true).open(log_path)?;
    if needs_header {
        file.write_all(FILE_HEADER.as_bytes())?;
    }
    file.write_all(entry.render().as_bytes())?;
    Ok(())
}

/// Read the whole recovery log, or `None` if there is none.
pub fn read_recovery_log(doc_path: &Path) -> io::Result<Option<String>> {
    match std::fs::read_to_string(recovery_log_path(doc_path)) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
