use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::model::document::Document;
use crate::model::task::{Recur, Task};

/// Next due date for `recur`, counted from `anchor`.
///
/// Monthly recurrence keeps the day of month, clamped to the last day of a
/// shorter month (Jan 31 -> Feb 28/29).
pub fn next_due(recur: Recur, anchor: NaiveDate) -> NaiveDate {
    match recur {
        Recur::Daily => add_days(anchor, 1),
        Recur::Weekdays => {
            let mut next = add_days(anchor, 1);
            while matches!(next.weekday(), Weekday::Sat | Weekday::Sun) {
                next = add_days(next, 1);
            }
            next
        }
        Recur::Weekly => add_days(anchor, 7),
        Recur::Monthly => anchor.checked_add_months(Months::new(1)).unwrap_or(anchor),
        Recur::EveryDays(n) => add_days(anchor, u64::from(n)),
    }
}

fn add_days(date: NaiveDate, n: u64) -> NaiveDate {
    date.checked_add_days(Days::new(n)).unwrap_or(date)
}

/// Pre-rollover state of a completed recurring task, kept so the completion
/// can be undone exactly. Never written into the task file itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rollover {
    pub section: String,
    pub task_id: String,
    pub title: String,
    pub completed_on: NaiveDate,
    pub previous_due: Option<NaiveDate>,
    pub previous_last_done: Option<NaiveDate>,
    pub next_due: NaiveDate,
}

/// Rollovers performed today, looked up when a completion is undone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloverLedger {
    entries: Vec<Rollover>,
}

impl RolloverLedger {
    pub fn new() -> Self {
        RolloverLedger::default()
    }

    pub fn record(&mut self, rollover: Rollover) {
        self.entries.retain(|r| {
            !(r.section == rollover.section
                && r.task_id == rollover.task_id
                && r.title == rollover.title)
        });
        self.entries.push(rollover);
    }

    /// Remove and return the rollover that produced `task`'s current state.
    pub fn take(&mut self, section: &str, task: &Task, today: NaiveDate) -> Option<Rollover> {
        self.prune(today);
        let index = self.entries.iter().position(|r| {
            r.section == section
                && r.task_id == task.id
                && r.title == task.title
                && Some(r.next_due) == task.due
        })?;
        Some(self.entries.remove(index))
    }

    /// Drop entries from days other than `today`; they can no longer be undone.
    pub fn prune(&mut self, today: NaiveDate) {
        self.entries.retain(|r| r.completed_on == today);
    }

    /// Add entries from `other` that this ledger does not hold yet.
    pub fn absorb(&mut self, other: RolloverLedger) {
        for entry in other.entries {
            if !self.entries.contains(&entry) {
                self.entries.push(entry);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Mark a recurring task complete on `today`: tick it, stamp `lastDone` and
/// advance `due` from the current due date (or from today if it had none).
pub fn complete_recurring(task: &mut Task, section: &str, today: NaiveDate) -> Option<Rollover> {
    let recur = task.recur?;
    let anchor = task.due.unwrap_or(today);
    let rollover = Rollover {
        section: section.to_string(),
        task_id: task.id.clone(),
        title: task.title.clone(),
        completed_on: today,
        previous_due: task.due,
        previous_last_done: task.last_done,
        next_due: next_due(recur, anchor),
    };
    task.done = true;
    task.last_done = Some(today);
    task.due = Some(rollover.next_due);
    Some(rollover)
}

/// Undo a completion made on `today`. With the captured rollover the task is
/// restored exactly; without it only `lastDone` is cleared.
pub fn reopen_recurring(task: &mut Task, today: NaiveDate, captured: Option<Rollover>) {
    task.done = false;
    match captured {
        Some(rollover) => {
            task.due = rollover.previous_due;
            task.last_done = rollover.previous_last_done;
        }
        None => {
            if task.last_done == Some(today) {
                task.last_done = None;
            }
        }
    }
}

/// What a recurrence-aware toggle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Checked,
    Unchecked,
    RolledOver { next_due: NaiveDate },
    Reopened,
}

/// Toggle a task the way a user sees it. Plain tasks flip their checkbox;
/// recurring tasks roll over when open today and reopen when already
/// completed today. Returns `None` when the section or id is unknown.
pub fn toggle_on(
    doc: &mut Document,
    section: &str,
    task_id: &str,
    today: NaiveDate,
    ledger: &mut RolloverLedger,
) -> Option<ToggleOutcome> {
    let task = doc.section_mut(section)?.find_task_mut(task_id)?;

    if !task.is_recurring() {
        task.done = !task.done;
        return Some(if task.done {
            ToggleOutcome::Checked
        } else {
            ToggleOutcome::Unchecked
        });
    }

    if task.is_complete_on(today) {
        let captured = ledger.take(section, task, today);
        reopen_recurring(task, today, captured);
        return Some(ToggleOutcome::Reopened);
    }

    let rollover = complete_recurring(task, section, today)?;
    let next_due = rollover.next_due;
    ledger.record(rollover);
    Some(ToggleOutcome::RolledOver { next_due })
}

/// Short status shown next to a recurring task: `done today`, `due today`,
/// `tomorrow`, `3d overdue`, `Jun 20`, `done Jun 1`, or nothing.
pub fn recur_status(
    due: Option<NaiveDate>,
    last_done: Option<NaiveDate>,
    today: NaiveDate,
) -> Option<String> {
    if last_done == Some(today) {
        return Some("done today".to_string());
    }
    if let Some(due) = due {
        let diff = (due - today).num_days();
        return Some(match diff {
            d if d < 0 => format!("{}d overdue", -d),
            0 => "due today".to_string(),
            1 => "tomorrow".to_string(),
            _ => due.format("%b %-d").to_string(),
        });
    }
    last_done.map(|d| format!("done {}", d.format("%b %-d")))
}
