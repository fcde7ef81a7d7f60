use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::io::recovery::atomic_write;
use crate::ops::recurrence::RolloverLedger;

/// Return the sidecar holding today's rollovers: `.<file name>.rollover.json`.
pub fn rollover_ledger_path(doc_path: &Path) -> PathBuf {
    let name = doc_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tasks.md".to_string());
    let dir = doc_path.parent().unwrap_or(Path::new("."));
    dir.join(format!(".{}.rollover.json", name))
}

/// Read the rollovers recorded for `doc_path` on `today`.
///
/// A missing or unreadable sidecar reads as an empty ledger. Entries from
/// other days are dropped.
pub fn read_ledger(doc_path: &Path, today: NaiveDate) -> RolloverLedger {
    let path = rollover_ledger_path(doc_path);
    let mut ledger = match fs::read_to_string(&path) {
        Ok(text) => match serde_json::from_str::<RolloverLedger>(&text) {
            Ok(ledger) => ledger,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable rollover ledger");
                RolloverLedger::new()
            }
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => RolloverLedger::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not read rollover ledger");
            RolloverLedger::new()
        }
    };
    ledger.prune(today);
    ledger
}

/// Write the ledger beside `doc_path`. An empty ledger removes the sidecar.
pub fn write_ledger(doc_path: &Path, ledger: &RolloverLedger) -> io::Result<()> {
    let path = rollover_ledger_path(doc_path);
    if ledger.is_empty() {
        return match fs::remove_file(&path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        };
    }
    let content = serde_json::to_string_pretty(ledger)?;
    atomic_write(&path, content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::parse_date;
    use crate::ops::recurrence::toggle_on;
    use crate::parse::parse_document;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn ledger_for(today: NaiveDate) -> RolloverLedger {
        let mut doc = parse_document("## Home\n- [ ] Water\n  - due: 2025-06-10\n  - recur: weekly\n");
        let mut ledger = RolloverLedger::new();
        toggle_on(&mut doc, "Home", "Home::0", today, &mut ledger);
        ledger
    }

    #[test]
    fn test_rollover_ledger_path() {
        assert_eq!(
            rollover_ledger_path(Path::new("/notes/todo.md")),
            PathBuf::from("/notes/.todo.md.rollover.json")
        );
    }

    #[test]
    fn test_write_then_read_same_day() {
        let tmp = TempDir::new().unwrap();
        let doc = tmp.path().join("tasks.md");
        let today = date("2025-06-10");
        let ledger = ledger_for(today);

        write_ledger(&doc, &ledger).unwrap();
        assert_eq!(read_ledger(&doc, today), ledger);
        assert!(read_ledger(&doc, date("2025-06-11")).is_empty());
    }

    #[test]
    fn test_empty_ledger_removes_sidecar() {
        let tmp = TempDir::new().unwrap();
        let doc = tmp.path().join("tasks.md");
        write_ledger(&doc, &ledger_for(date("2025-06-10"))).unwrap();
        assert!(rollover_ledger_path(&doc).exists());

        write_ledger(&doc, &RolloverLedger::new()).unwrap();
        assert!(!rollover_ledger_path(&doc).exists());
        // Removing twice is fine
        write_ledger(&doc, &RolloverLedger::new()).unwrap();
    }

    #[test]
    fn test_garbage_sidecar_reads_empty() {
        let tmp = TempDir::new().unwrap();
        let doc = tmp.path().join("tasks.md");
        fs::write(rollover_ledger_path(&doc), "not json").unwrap();
        assert!(read_ledger(&doc, date("2025-06-10")).is_empty());
    }
}
