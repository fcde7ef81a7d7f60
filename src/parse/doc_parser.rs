use std::sync::LazyLock;

use regex::Regex;

use crate::model::document::{DEFAULT_SECTION, Document};
use crate::model::task::{MetaField, Task};

static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#{2,6}\s+(.*)$").unwrap());
static TASK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*- \[( |x|X)\] (.*)$").unwrap());
static META_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s{2,}-\s+([^:]+):\s*(.*)$").unwrap());

/// What a single source line means to the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Line<'a> {
    Heading(&'a str),
    Task { done: bool, title: &'a str },
    Meta { key: &'a str, value: &'a str },
    Blank,
    Other,
}

fn classify(line: &str) -> Line<'_> {
    if let Some(caps) = HEADING.captures(line) {
        let name = caps.get(1).map_or("", |m| m.as_str());
        return Line::Heading(name.trim());
    }
    if let Some(caps) = TASK_LINE.captures(line) {
        let mark = caps.get(1).map_or(" ", |m| m.as_str());
        let title = caps.get(2).map_or("", |m| m.as_str());
        return Line::Task {
            done: mark.eq_ignore_ascii_case("x"),
            title: title.trim_end(),
        };
    }
    if let Some(caps) = META_LINE.captures(line) {
        let key = caps.get(1).map_or("", |m| m.as_str());
        let value = caps.get(2).map_or("", |m| m.as_str());
        return Line::Meta {
            key: key.trim(),
            value: value.trim(),
        };
    }
    if line.trim().is_empty() {
        Line::Blank
    } else {
        Line::Other
    }
}

/// Parse a task file. Never fails: unrecognized lines are skipped.
pub fn parse_document(source: &str) -> Document {
    parse_document_with_dropped(source).0
}

/// Parse a task file, also returning the non-blank lines that carry no
/// meaning in the grammar (and so would not survive a rewrite).
///
/// The canonical `# Tasks` title line is not reported.
pub fn parse_document_with_dropped(source: &str) -> (Document, Vec<String>) {
    let normalized = source.replace("\r\n", "\n");
    let mut doc = Document::new();
    let mut dropped = Vec::new();

    // Indices into doc.sections / that section's tasks
    let mut current_section: Option<usize> = None;
    let mut current_task: Option<usize> = None;

    for line in normalized.split('\n') {
        match classify(line) {
            Line::Heading(name) => {
                current_section = Some(section_index(&mut doc, name));
                current_task = None;
            }
            Line::Task { done, title } => {
                let s = match current_section {
                    Some(s) => s,
                    None => {
                        let s = section_index(&mut doc, DEFAULT_SECTION);
                        current_section = Some(s);
                        s
                    }
                };
                let mut task = Task::new(title);
                task.done = done;
                let section = &mut doc.sections[s];
                section.push(task);
                current_task = Some(section.tasks.len() - 1);
            }
            Line::Meta { key, value } => match (current_section, current_task) {
                (Some(s), Some(t)) => {
                    MetaField::classify(key, value).apply(&mut doc.sections[s].tasks[t]);
                }
                _ => dropped.push(line.to_string()),
            },
            Line::Blank => {}
            Line::Other => {
                current_task = None;
                if line.trim_end() != super::TITLE_LINE {
                    dropped.push(line.to_string());
                }
            }
        }
    }

    (doc, dropped)
}

fn section_index(doc: &mut Document, name: &str) -> usize {
    match doc.sections.iter().position(|s| s.name == name) {
        Some(index) => index,
        None => {
            doc.ensure_section(name);
            doc.sections.len() - 1
        }
    }
}
