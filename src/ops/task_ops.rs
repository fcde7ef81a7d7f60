use chrono::NaiveDate;

use crate::model::document::Document;
use crate::model::task::{Effort, Priority, Recur, Task};

/// Change to one optional field in a [`TaskPatch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    /// Leave the field as it is.
    #[default]
    Keep,
    Set(T),
    /// Remove the field
    Clear,
}

impl<T: PartialEq> Patch<T> {
    /// Write this change into `slot`. Returns whether the slot changed.
    fn apply_to(self, slot: &mut Option<T>) -> bool {
        let next = match self {
            Patch::Keep => return false,
            Patch::Set(value) => Some(value),
            Patch::Clear => None,
        };
        if *slot == next {
            return false;
        }
        *slot = next;
        true
    }
}

/// A partial update to a task. `extra` is never touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub done: Option<bool>,
    pub priority: Patch<Priority>,
    pub effort: Patch<Effort>,
    pub due: Patch<NaiveDate>,
    pub recur: Patch<Recur>,
}

/// A change requested against the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    AddSection {
        name: String,
    },
    AddTask {
        section: String,
        title: String,
    },
    ToggleTask {
        section: String,
        task_id: String,
    },
    UpdateTask {
        section: String,
        task_id: String,
        patch: TaskPatch,
    },
    ReorderTask {
        section: String,
        from: usize,
        to: usize,
    },
}

/// Apply a mutation with plain toggle semantics. Returns whether the document
/// changed; ids are renumbered before returning.
///
/// Unknown sections, unknown ids and out-of-range indices are no-ops.
pub fn apply(doc: &mut Document, mutation: Mutation) -> bool {
    match mutation {
        Mutation::AddSection { name } => add_section(doc, &name),
        Mutation::AddTask { section, title } => add_task(doc, &section, &title),
        Mutation::ToggleTask { section, task_id } => toggle_task(doc, &section, &task_id),
        Mutation::UpdateTask {
            section,
            task_id,
            patch,
        } => update_task(doc, &section, &task_id, patch),
        Mutation::ReorderTask { section, from, to } => reorder_task(doc, &section, from, to),
    }
}

/// Collapse line breaks and trim, so a name or title fits on its markdown line
/// and reads back unchanged.
pub fn single_line(text: &str) -> String {
    text.split(['\r', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Append an empty section unless one with this name exists.
pub fn add_section(doc: &mut Document, name: &str) -> bool {
    let name = single_line(name);
    if name.is_empty() || doc.section(&name).is_some() {
        return false;
    }
    doc.ensure_section(&name);
    true
}

/// Append an open task to `section`, creating the section if needed.
pub fn add_task(doc: &mut Document, section: &str, title: &str) -> bool {
    let section = single_line(section);
    if section.is_empty() {
        return false;
    }
    doc.ensure_section(&section).push(Task::new(single_line(title)));
    true
}

/// Flip a task's checkbox.
pub fn toggle_task(doc: &mut Document, section: &str, task_id: &str) -> bool {
    let Some(task) = doc
        .section_mut(section)
        .and_then(|s| s.find_task_mut(task_id))
    else {
        return false;
    };
    task.done = !task.done;
    true
}

/// Apply `patch` to one task.
pub fn update_task(doc: &mut Document, section: &str, task_id: &str, patch: TaskPatch) -> bool {
    let Some(task) = doc
        .section_mut(section)
        .and_then(|s| s.find_task_mut(task_id))
    else {
        return false;
    };

    let mut changed = false;
    if let Some(title) = patch.title {
        let title = single_line(&title);
        if task.title != title {
            task.title = title;
            changed = true;
        }
    }
    if let Some(done) = patch.done
        && task.done != done
    {
        task.done = done;
        changed = true;
    }
    changed |= patch.priority.apply_to(&mut task.priority);
    changed |= patch.effort.apply_to(&mut task.effort);
    changed |= patch.due.apply_to(&mut task.due);
    changed |= patch.recur.apply_to(&mut task.recur);
    changed
}

/// Move the task at `from` so it ends up at index `to`.
pub fn reorder_task(doc: &mut Document, section: &str, from: usize, to: usize) -> bool {
    let Some(section) = doc.section_mut(section) else {
        return false;
    };
    let len = section.tasks.len();
    if from >= len || to >= len || from == to {
        return false;
    }
    let task = section.tasks.remove(from);
    section.tasks.insert(to, task);
    section.renumber();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::parse_date;
    use crate::parse::{parse_document, serialize_document};
    use pretty_assertions::assert_eq;

    fn sample_doc() -> Document {
        parse_document(
            "\
# Tasks

## Inbox
- [ ] A
- [ ] B
  - owner: ann
- [x] C

## Work
- [ ] Ship
  - priority: P1
  - due: 2025-06-10
",
        )
    }

    fn titles(doc: &Document, section: &str) -> Vec<String> {
        doc.section(section)
            .unwrap()
            .tasks
            .iter()
            .map(|t| t.title.clone())
            .collect()
    }

    #[test]
    fn test_add_section_is_idempotent() {
        let mut doc = sample_doc();
        assert!(add_section(&mut doc, "Home"));
        assert!(!add_section(&mut doc, "Home"));
        assert!(!add_section(&mut doc, "Work"));
        assert!(!add_section(&mut doc, "   "));
        let names: Vec<&str> = doc.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Inbox", "Work", "Home"]);
    }

    #[test]
    fn test_add_task_creates_missing_section() {
        let mut doc = Document::new();
        assert!(add_task(&mut doc, "Errands", "  Post letter\n"));
        let task = &doc.sections[0].tasks[0];
        assert_eq!(doc.sections[0].name, "Errands");
        assert_eq!(task.title, "Post letter");
        assert_eq!(task.id, "Errands::0");
        assert!(!task.done);
        assert!(task.extra.is_empty());
    }

    #[test]
    fn test_toggle_task_flips_done() {
        let mut doc = sample_doc();
        assert!(toggle_task(&mut doc, "Inbox", "Inbox::2"));
        assert!(!doc.sections[0].tasks[2].done);
        assert!(toggle_task(&mut doc, "Inbox", "Inbox::2"));
        assert!(doc.sections[0].tasks[2].done);
    }

    #[test]
    fn test_unknown_targets_are_noops() {
        let mut doc = sample_doc();
        let before = doc.clone();
        assert!(!toggle_task(&mut doc, "Nope", "Nope::0"));
        assert!(!toggle_task(&mut doc, "Inbox", "Inbox::9"));
        assert!(!toggle_task(&mut doc, "Work", "Inbox::0"));
        assert!(!update_task(
            &mut doc,
            "Inbox",
            "Inbox::7",
            TaskPatch {
                done: Some(true),
                ..Default::default()
            }
        ));
        assert!(!reorder_task(&mut doc, "Nope", 0, 1));
        assert_eq!(doc, before);
    }

    #[test]
    fn test_update_task_sets_and_clears() {
        let mut doc = sample_doc();
        let patch = TaskPatch {
            title: Some("Ship 1.0".into()),
            priority: Patch::Clear,
            effort: Patch::Set(Effort::L),
            recur: Patch::Set(Recur::Weekly),
            ..Default::default()
        };
        assert!(update_task(&mut doc, "Work", "Work::0", patch));

        let task = &doc.sections[1].tasks[0];
        assert_eq!(task.title, "Ship 1.0");
        assert_eq!(task.priority, None);
        assert_eq!(task.effort, Some(Effort::L));
        assert_eq!(task.recur, Some(Recur::Weekly));
        // Absent from the patch: untouched
        assert_eq!(task.due, parse_date("2025-06-10"));
        assert!(!task.done);
    }

    #[test]
    fn test_update_task_never_touches_extra() {
        let mut doc = sample_doc();
        let patch = TaskPatch {
            due: Patch::Set(parse_date("2025-01-01").unwrap()),
            ..Default::default()
        };
        assert!(update_task(&mut doc, "Inbox", "Inbox::1", patch));
        let task = &doc.sections[0].tasks[1];
        assert_eq!(task.extra.len(), 1);
        assert_eq!(task.extra["owner"], "ann");
    }

    #[test]
    fn test_update_task_reports_unchanged() {
        let mut doc = sample_doc();
        let patch = TaskPatch {
            priority: Patch::Set(Priority::P1),
            title: Some("Ship".into()),
            done: Some(false),
            effort: Patch::Clear,
            ..Default::default()
        };
        assert!(!update_task(&mut doc, "Work", "Work::0", patch));
    }

    #[test]
    fn test_reorder_moves_and_renumbers() {
        let mut doc = sample_doc();
        assert!(reorder_task(&mut doc, "Inbox", 0, 2));
        assert_eq!(titles(&doc, "Inbox"), vec!["B", "C", "A"]);
        let ids: Vec<&str> = doc.sections[0].tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["Inbox::0", "Inbox::1", "Inbox::2"]);
        // Extra metadata travels with its task
        assert_eq!(doc.sections[0].tasks[0].extra["owner"], "ann");
    }

    #[test]
    fn test_reorder_invalid_indices_are_noops() {
        let mut doc = sample_doc();
        assert!(!reorder_task(&mut doc, "Inbox", 5, 0));
        assert!(!reorder_task(&mut doc, "Inbox", 0, 3));
        assert!(!reorder_task(&mut doc, "Inbox", 1, 1));
        assert_eq!(titles(&doc, "Inbox"), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_mutated_document_round_trips() {
        let mut doc = Document::new();
        apply(&mut doc, Mutation::AddSection { name: "Home".into() });
        apply(
            &mut doc,
            Mutation::AddTask {
                section: "Home".into(),
                title: "Water plants".into(),
            },
        );
        apply(
            &mut doc,
            Mutation::AddTask {
                section: "Work".into(),
                title: "Draft\nreport".into(),
            },
        );
        apply(
            &mut doc,
            Mutation::UpdateTask {
                section: "Home".into(),
                task_id: "Home::0".into(),
                patch: TaskPatch {
                    recur: Patch::Set(Recur::EveryDays(3)),
                    due: Patch::Set(parse_date("2025-06-10").unwrap()),
                    ..Default::default()
                },
            },
        );
        apply(
            &mut doc,
            Mutation::ToggleTask {
                section: "Work".into(),
                task_id: "Work::0".into(),
            },
        );

        let reparsed = parse_document(&serialize_document(&doc));
        assert_eq!(reparsed, doc);
        assert_eq!(reparsed.sections[1].tasks[0].title, "Draft report");
    }

    #[test]
    fn test_single_line() {
        assert_eq!(single_line("  a \r\n b\n\nc  "), "a b c");
        assert_eq!(single_line("\n"), "");
    }
}
