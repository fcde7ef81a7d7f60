use chrono::NaiveDate;
use serde::Serialize;

use crate::model::config::Settings;
use crate::model::document::Section;
use crate::model::task::{DATE_FORMAT, Task};
use crate::ops::recurrence::recur_status;
use crate::ops::reminders::Reminder;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct TaskJson<'a> {
    #[serde(flatten)]
    pub task: &'a Task,
    /// Done for today (recurring) or checked (plain)
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Serialize)]
pub struct SectionJson<'a> {
    pub name: &'a str,
    pub tasks: Vec<TaskJson<'a>>,
}

#[derive(Serialize)]
pub struct SectionCountJson<'a> {
    pub name: &'a str,
    pub open: usize,
    pub total: usize,
}

#[derive(Serialize)]
pub struct ReminderJson<'a> {
    pub section: &'a str,
    pub title: &'a str,
    pub due: String,
    pub fire_at: String,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn task_to_json(task: &Task, today: NaiveDate) -> TaskJson<'_> {
    TaskJson {
        task,
        complete: task.is_complete_on(today),
        status: status_of(task, today),
    }
}

pub fn section_to_json<'a>(section: &'a Section, tasks: &[&'a Task], today: NaiveDate) -> SectionJson<'a> {
    SectionJson {
        name: &section.name,
        tasks: tasks.iter().map(|t| task_to_json(t, today)).collect(),
    }
}

pub fn section_counts(section: &Section, today: NaiveDate) -> SectionCountJson<'_> {
    let open = section
        .tasks
        .iter()
        .filter(|t| !t.is_complete_on(today))
        .count();
    SectionCountJson {
        name: &section.name,
        open,
        total: section.tasks.len(),
    }
}

pub fn reminder_to_json(reminder: &Reminder) -> ReminderJson<'_> {
    ReminderJson {
        section: &reminder.key.section,
        title: &reminder.key.title,
        due: reminder.key.due.format(DATE_FORMAT).to_string(),
        fire_at: reminder.fire_at.format("%Y-%m-%d %H:%M").to_string(),
    }
}

fn status_of(task: &Task, today: NaiveDate) -> Option<String> {
    if task.is_recurring() {
        recur_status(task.due, task.last_done, today)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

/// One task as a listing line: `[x] Title  (id)` plus its metadata.
pub fn format_task(task: &Task, today: NaiveDate) -> String {
    let check = if task.is_complete_on(today) { "x" } else { " " };
    let mut line = format!("  [{}] {}", check, task.title);

    let mut meta = Vec::new();
    if let Some(p) = task.priority {
        meta.push(p.to_string());
    }
    if let Some(e) = task.effort {
        meta.push(e.to_string());
    }
    if let Some(due) = task.due {
        meta.push(format!("due {}", due.format(DATE_FORMAT)));
    }
    if let Some(recur) = task.recur {
        meta.push(recur.to_string());
    }
    if let Some(status) = status_of(task, today) {
        meta.push(status);
    }
    for (key, value) in &task.extra {
        meta.push(format!("{}: {}", key, value));
    }
    if !meta.is_empty() {
        line.push_str(&format!("  [{}]", meta.join(", ")));
    }
    line.push_str(&format!("  ({})", task.id));
    line
}

pub fn format_section(section: &Section, tasks: &[&Task], today: NaiveDate) -> String {
    let mut out = format!("## {}", section.name);
    for task in tasks {
        out.push('\n');
        out.push_str(&format_task(task, today));
    }
    out
}

pub fn format_reminder(reminder: &Reminder) -> String {
    format!(
        "{}  {} ({})",
        reminder.fire_at.format("%Y-%m-%d %H:%M"),
        reminder.key.title,
        reminder.key.section
    )
}

pub fn format_settings(settings: &Settings) -> String {
    let path = settings
        .markdown_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(unset)".to_string());
    format!(
        "markdown_path = {}\nnotification_time = {}\nfeatures.notifications = {}\nfeatures.recurring = {}",
        path,
        settings.notification_time,
        settings.features.notifications,
        settings.features.recurring
    )
}
