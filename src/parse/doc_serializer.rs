use crate::model::document::Document;
use crate::model::task::{DATE_FORMAT, Task};

/// Serialize a document to its canonical markdown form.
///
/// Metadata is always written in the order priority, effort, due, recur,
/// lastDone, then extra entries as they were read.
pub fn serialize_document(doc: &Document) -> String {
    let mut lines: Vec<String> = vec![super::TITLE_LINE.to_string(), String::new()];

    for section in &doc.sections {
        lines.push(format!("## {}", section.name));
        for task in &section.tasks {
            serialize_task(task, &mut lines);
        }
        lines.push(String::new());
    }

    // Collapse the trailing blank run to a single newline. Only newlines are
    // stripped so an untitled last task keeps its `- [ ] ` marker intact.
    let mut out = lines.join("\n");
    out.truncate(out.trim_end_matches('\n').len());
    out.push('\n');
    out
}

fn serialize_task(task: &Task, lines: &mut Vec<String>) {
    lines.push(format!("- [{}] {}", if task.done { 'x' } else { ' ' }, task.title));

    if let Some(priority) = task.priority {
        lines.push(meta_line("priority", priority.as_str()));
    }
    if let Some(effort) = task.effort {
        lines.push(meta_line("effort", effort.as_str()));
    }
    if let Some(due) = task.due {
        lines.push(meta_line("due", &due.format(DATE_FORMAT).to_string()));
    }
    if let Some(recur) = task.recur {
        lines.push(meta_line("recur", &recur.to_string()));
    }
    if let Some(last_done) = task.last_done {
        lines.push(meta_line("lastDone", &last_done.format(DATE_FORMAT).to_string()));
    }
    for (key, value) in &task.extra {
        lines.push(meta_line(key, value));
    }
}

fn meta_line(key: &str, value: &str) -> String {
    if value.is_empty() {
        format!("  - {}:", key)
    } else {
        format!("  - {}: {}", key, value)
    }
}
