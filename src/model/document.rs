use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::task::Task;

/// Section a task lands in when it appears before any heading.
pub const DEFAULT_SECTION: &str = "Inbox";

/// Which tasks a listing shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskFilter {
    #[default]
    Open,
    Done,
    All,
}

impl TaskFilter {
    fn keeps(self, complete: bool) -> bool {
        match self {
            TaskFilter::Open => !complete,
            TaskFilter::Done => complete,
            TaskFilter::All => true,
        }
    }
}

impl FromStr for TaskFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TaskFilter::Open),
            "done" => Ok(TaskFilter::Done),
            "all" => Ok(TaskFilter::All),
            other => Err(format!("unknown filter '{}' (expected open, done or all)", other)),
        }
    }
}

impl fmt::Display for TaskFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskFilter::Open => write!(f, "open"),
            TaskFilter::Done => write!(f, "done"),
            TaskFilter::All => write!(f, "all"),
        }
    }
}

/// A named, ordered list of tasks (one `##` heading).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub tasks: Vec<Task>,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Section {
            name: name.into(),
            tasks: Vec::new(),
        }
    }

    /// Id of the task at `index` within this section.
    pub fn task_id(&self, index: usize) -> String {
        format!("{}::{}", self.name, index)
    }

    /// Append a task, giving it the next positional id.
    pub fn push(&mut self, mut task: Task) -> &mut Task {
        task.id = self.task_id(self.tasks.len());
        self.tasks.push(task);
        let last = self.tasks.len() - 1;
        &mut self.tasks[last]
    }

    /// Recompute every task id from its current position.
    pub fn renumber(&mut self) {
        let name = &self.name;
        for (index, task) in self.tasks.iter_mut().enumerate() {
            task.id = format!("{}::{}", name, index);
        }
    }

    pub fn position_of(&self, task_id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == task_id)
    }

    pub fn find_task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    /// Tasks passing `filter` on the raw checkbox, in section order.
    pub fn filtered(&self, filter: TaskFilter) -> Vec<&Task> {
        self.tasks.iter().filter(|t| filter.keeps(t.done)).collect()
    }

    /// Like [`Section::filtered`], but recurring tasks count as done only
    /// when completed on `today`.
    pub fn filtered_on(&self, filter: TaskFilter, today: NaiveDate) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| filter.keeps(t.is_complete_on(today)))
            .collect()
    }
}

/// The whole task file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub sections: Vec<Section>,
}

impl Document {
    pub fn new() -> Self {
        Document::default()
    }

    /// A fresh file's contents: a single empty `Inbox` section.
    pub fn with_default_section() -> Self {
        Document {
            sections: vec![Section::new(DEFAULT_SECTION)],
        }
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn section_mut(&mut self, name: &str) -> Option<&mut Section> {
        self.sections.iter_mut().find(|s| s.name == name)
    }

    /// Return the section called `name`, appending an empty one if missing.
    pub fn ensure_section(&mut self, name: &str) -> &mut Section {
        let index = match self.sections.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                self.sections.push(Section::new(name));
                self.sections.len() - 1
            }
        };
        &mut self.sections[index]
    }

    /// Recompute ids across every section.
    pub fn renumber(&mut self) {
        for section in &mut self.sections {
            section.renumber();
        }
    }

    /// Resolve a remembered "current section" against this document: keep it
    /// if it still exists, otherwise fall back to the first section.
    pub fn resolve_section(&self, current: Option<&str>) -> Option<&str> {
        if let Some(name) = current
            && let Some(section) = self.section(name)
        {
            return Some(&section.name);
        }
        self.sections.first().map(|s| s.name.as_str())
    }

    /// Iterate `(section, task)` pairs in document order.
    pub fn tasks(&self) -> impl Iterator<Item = (&Section, &Task)> {
        self.sections
            .iter()
            .flat_map(|s| s.tasks.iter().map(move |t| (s, t)))
    }
}
