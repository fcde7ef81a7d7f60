//! Integration tests for the `zuri` CLI.
//!
//! Each test points `zuri` at a task file and a settings file inside a temp
//! directory, runs it as a subprocess, and verifies stdout and/or file
//! contents.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use chrono::{Days, Local};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

/// Get the path to the built `zuri` binary.
fn zuri_bin() -> PathBuf {
    // cargo test builds to target/debug/
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("zuri");
    path
}

struct Env {
    tmp: TempDir,
}

impl Env {
    fn new() -> Env {
        Env {
            tmp: TempDir::new().unwrap(),
        }
    }

    fn with_tasks(content: &str) -> Env {
        let env = Env::new();
        fs::write(env.tasks(), content).unwrap();
        env
    }

    fn tasks(&self) -> PathBuf {
        self.tmp.path().join("tasks.md")
    }

    fn settings(&self) -> PathBuf {
        self.tmp.path().join("settings.toml")
    }

    /// Run with both `--file` and `--config` set
    fn run(&self, args: &[&str]) -> Output {
        let tasks = self.tasks();
        let mut full = vec!["--file", path_str(&tasks)];
        full.extend_from_slice(args);
        self.run_raw(&full)
    }

    /// Run with only `--config` set
    fn run_raw(&self, args: &[&str]) -> Output {
        Command::new(zuri_bin())
            .arg("--config")
            .arg(self.settings())
            .args(args)
            .env("ZURI_LOG", "off")
            .output()
            .expect("failed to run zuri")
    }

    fn read_tasks(&self) -> String {
        fs::read_to_string(self.tasks()).unwrap()
    }
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "zuri failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap()
}

fn stderr(output: &Output) -> String {
    assert!(!output.status.success(), "zuri unexpectedly succeeded");
    String::from_utf8(output.stderr.clone()).unwrap()
}

const SAMPLE: &str = "\
# Tasks

## Inbox
- [ ] Buy milk
- [x] Call plumber

## Work
- [ ] Quarterly report
  - priority: P0
  - owner: dana
- [ ] Review PR
";

// ============================================================================
// Adding
// ============================================================================

#[test]
fn add_creates_file_and_prints_id() {
    let env = Env::new();
    let out = stdout(&env.run(&["add", "Buy", "milk"]));
    assert_eq!(out, "Inbox::0\n");
    assert_eq!(env.read_tasks(), "# Tasks\n\n## Inbox\n- [ ] Buy milk\n");

    let out = stdout(&env.run(&["add", "--section", "Work", "Ship it"]));
    assert_eq!(out, "Work::0\n");
    assert_eq!(
        env.read_tasks(),
        "# Tasks\n\n## Inbox\n- [ ] Buy milk\n\n## Work\n- [ ] Ship it\n"
    );
}

#[test]
fn add_defaults_to_first_section() {
    let env = Env::with_tasks("## Work\n- [ ] Existing\n");
    let out = stdout(&env.run(&["add", "Another"]));
    assert_eq!(out, "Work::1\n");
}

#[test]
fn add_section_is_idempotent() {
    let env = Env::new();
    stdout(&env.run(&["add-section", "Errands"]));
    stdout(&env.run(&["add-section", "Errands"]));
    assert_eq!(env.read_tasks(), "# Tasks\n\n## Inbox\n\n## Errands\n");
}

// ============================================================================
// Listing
// ============================================================================

#[test]
fn list_shows_open_tasks_with_ids() {
    let env = Env::with_tasks(SAMPLE);
    let out = stdout(&env.run(&["list"]));
    assert_eq!(
        out,
        "\
## Inbox
  [ ] Buy milk  (Inbox::0)

## Work
  [ ] Quarterly report  [P0, owner: dana]  (Work::0)
  [ ] Review PR  (Work::1)
"
    );
}

#[test]
fn list_filters_by_section_and_state() {
    let env = Env::with_tasks(SAMPLE);
    let out = stdout(&env.run(&["list", "--section", "Inbox", "--filter", "done"]));
    assert_eq!(out, "## Inbox\n  [x] Call plumber  (Inbox::1)\n");

    let err = stderr(&env.run(&["list", "--filter", "someday"]));
    assert!(err.contains("unknown filter"));
}

#[test]
fn list_json() {
    let env = Env::with_tasks(SAMPLE);
    let out = stdout(&env.run(&["--json", "list", "--filter", "all"]));
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value[0]["name"], "Inbox");
    assert_eq!(value[0]["tasks"][1]["done"], true);
    assert_eq!(value[1]["tasks"][0]["id"], "Work::0");
    assert_eq!(value[1]["tasks"][0]["priority"], "P0");
    assert_eq!(value[1]["tasks"][0]["extra"]["owner"], "dana");
}

#[test]
fn sections_shows_counts() {
    let env = Env::with_tasks(SAMPLE);
    let out = stdout(&env.run(&["sections"]));
    assert_eq!(out, "Inbox  1/2\nWork  2/2\n");
}

#[test]
fn reading_does_not_create_the_file() {
    let env = Env::new();
    assert_eq!(stdout(&env.run(&["list"])), "");
    assert!(!env.tasks().exists());
}

// ============================================================================
// Changing tasks
// ============================================================================

#[test]
fn toggle_by_index_and_by_id() {
    let env = Env::with_tasks(SAMPLE);
    let out = stdout(&env.run(&["toggle", "Inbox", "0"]));
    assert_eq!(out, "[x] Buy milk  (Inbox::0)\n");
    stdout(&env.run(&["toggle", "Inbox", "Inbox::1"]));

    let text = env.read_tasks();
    assert!(text.contains("- [x] Buy milk\n"));
    assert!(text.contains("- [ ] Call plumber\n"));
}

#[test]
fn toggle_twice_restores_recurring_due_date() {
    let today = Local::now().date_naive();
    let next = today.checked_add_days(Days::new(7)).unwrap();
    let env = Env::with_tasks(&format!(
        "# Tasks\n\n## Home\n- [ ] Water\n  - due: {}\n  - recur: every 7 days\n",
        today.format("%Y-%m-%d")
    ));
    let original = env.read_tasks();
    let ledger = env.tmp.path().join(".tasks.md.rollover.json");

    stdout(&env.run(&["toggle", "Home", "0"]));
    let text = env.read_tasks();
    assert!(text.contains(&format!("  - due: {}\n", next.format("%Y-%m-%d"))));
    assert!(text.contains(&format!("  - lastDone: {}\n", today.format("%Y-%m-%d"))));
    assert!(ledger.exists());

    stdout(&env.run(&["toggle", "Home", "0"]));
    assert_eq!(env.read_tasks(), original);
    assert!(!ledger.exists());
}

#[test]
fn toggle_unknown_task_fails() {
    let env = Env::with_tasks(SAMPLE);
    let err = stderr(&env.run(&["toggle", "Inbox", "7"]));
    assert!(err.contains("task not found: Inbox::7"));
    let err = stderr(&env.run(&["toggle", "Nowhere", "0"]));
    assert!(err.contains("section not found: Nowhere"));
    assert_eq!(env.read_tasks(), SAMPLE);
}

#[test]
fn edit_sets_and_clears_fields() {
    let env = Env::with_tasks(SAMPLE);
    stdout(&env.run(&[
        "edit", "Work", "1", "--priority", "P2", "--due", "2030-01-15", "--recur", "every 3 days",
    ]));
    let text = env.read_tasks();
    assert!(text.contains(
        "- [ ] Review PR\n  - priority: P2\n  - due: 2030-01-15\n  - recur: every 3 days\n"
    ));

    stdout(&env.run(&["edit", "Work", "0", "--priority", "none", "--title", "Q3 report"]));
    let text = env.read_tasks();
    assert!(text.contains("- [ ] Q3 report\n  - owner: dana\n"));
}

#[test]
fn edit_rejects_bad_values() {
    let env = Env::with_tasks(SAMPLE);
    let err = stderr(&env.run(&["edit", "Work", "0", "--due", "tomorrow"]));
    assert!(err.contains("invalid due date"));
    let err = stderr(&env.run(&["edit", "Work", "0"]));
    assert!(err.contains("nothing to change"));
    assert_eq!(env.read_tasks(), SAMPLE);
}

#[test]
fn mv_reorders_within_section() {
    let env = Env::with_tasks("## Work\n- [ ] A\n- [ ] B\n- [ ] C\n");
    let out = stdout(&env.run(&["mv", "Work", "0", "2"]));
    assert_eq!(
        out,
        "## Work\n  [ ] B  (Work::0)\n  [ ] C  (Work::1)\n  [ ] A  (Work::2)\n"
    );
    let err = stderr(&env.run(&["mv", "Work", "5", "0"]));
    assert!(err.contains("position out of range"));
}

// ============================================================================
// Reminders, recovery, settings
// ============================================================================

#[test]
fn reminders_lists_future_due_tasks() {
    let env = Env::with_tasks(
        "## Work\n- [ ] Launch\n  - due: 2099-03-01\n- [x] Done already\n  - due: 2099-03-01\n- [ ] Past\n  - due: 2001-01-01\n",
    );
    fs::write(env.settings(), "notification_time = \"08:30\"\n").unwrap();
    let out = stdout(&env.run(&["reminders"]));
    assert_eq!(out, "2099-03-01 08:30  Launch (Work)\n");

    fs::write(env.settings(), "[features]\nnotifications = false\n").unwrap();
    let out = stdout(&env.run(&["reminders"]));
    assert_eq!(out, "notifications are off\n");
}

#[test]
fn recovery_keeps_dropped_prose() {
    let env = Env::with_tasks("Shopping notes, do not lose\n## Inbox\n- [ ] Buy milk\n");
    stdout(&env.run(&["add", "Eggs"]));
    assert!(!env.read_tasks().contains("Shopping notes"));

    let out = stdout(&env.run(&["recovery"]));
    assert!(out.contains("Shopping notes, do not lose"));
}

#[test]
fn config_set_and_show() {
    let env = Env::new();
    let tasks = env.tasks();
    stdout(&env.run_raw(&["config", "set", "markdown_path", path_str(&tasks)]));
    stdout(&env.run_raw(&["config", "set", "notification_time", "07:45"]));
    let out = stdout(&env.run_raw(&["config", "show"]));
    assert!(out.contains(&format!("markdown_path = {}", tasks.display())));
    assert!(out.contains("notification_time = 07:45"));
    assert!(out.contains("features.notifications = true"));

    // markdown_path is used when --file is absent
    assert_eq!(stdout(&env.run_raw(&["add", "From settings"])), "Inbox::0\n");
    assert!(env.read_tasks().contains("- [ ] From settings"));

    let err = stderr(&env.run_raw(&["config", "set", "notification_time", "7:45"]));
    assert!(err.contains("expected HH:MM"));
}

#[test]
fn missing_task_file_setting_is_an_error() {
    let env = Env::new();
    let err = stderr(&env.run_raw(&["list"]));
    assert!(err.contains("no task file"));
}
