use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::model::config::FireTime;
use crate::model::document::Document;

/// Identity of an armed reminder. Two tasks sharing all four parts share one timer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ReminderKey {
    pub section: String,
    pub title: String,
    pub due: NaiveDate,
    pub fire_time: FireTime,
}

/// A reminder that should fire at a local wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reminder {
    pub key: ReminderKey,
    pub fire_at: NaiveDateTime,
}

/// Work out which reminders to arm: one per unticked task with a due date
/// whose `due` at `fire_time` is still after `now`. Past-due tasks are skipped.
pub fn plan_reminders(doc: &Document, fire_time: FireTime, now: NaiveDateTime) -> Vec<Reminder> {
    let mut seen = HashSet::new();
    let mut planned = Vec::new();

    for (section, task) in doc.tasks() {
        if !task.awaits_reminder() {
            continue;
        }
        let Some(due) = task.due else {
            continue;
        };
        let fire_at = due.and_time(fire_time.as_naive_time());
        if fire_at <= now {
            continue;
        }
        let key = ReminderKey {
            section: section.name.clone(),
            title: task.title.clone(),
            due,
            fire_time,
        };
        if seen.insert(key.clone()) {
            planned.push(Reminder { key, fire_at });
        }
    }

    planned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::parse_date;
    use crate::parse::parse_document;
    use pretty_assertions::assert_eq;

    fn at(date: &str, hour: u32, minute: u32) -> NaiveDateTime {
        parse_date(date).unwrap().and_hms_opt(hour, minute, 0).unwrap()
    }

    fn sample() -> Document {
        parse_document(
            "\
## Work
- [ ] Report
  - due: 2025-06-10
- [x] Finished
  - due: 2025-06-12
- [ ] No date
- [ ] Old
  - due: 2025-06-01
## Home
- [x] Water plants
  - due: 2025-06-17
  - recur: weekly
  - lastDone: 2025-06-10
- [ ] Report
  - due: 2025-06-10
",
        )
    }

    #[test]
    fn test_plans_future_pending_tasks_only() {
        let now = at("2025-06-09", 12, 0);
        let planned = plan_reminders(&sample(), FireTime::new(9, 0), now);
        let keys: Vec<(&str, &str, String)> = planned
            .iter()
            .map(|r| {
                (
                    r.key.section.as_str(),
                    r.key.title.as_str(),
                    r.fire_at.to_string(),
                )
            })
            .collect();
        assert_eq!(
            keys,
            vec![
                ("Work", "Report", "2025-06-10 09:00:00".to_string()),
                ("Home", "Report", "2025-06-10 09:00:00".to_string()),
            ]
        );
    }

    #[test]
    fn test_recurring_tasks_follow_checkbox() {
        let doc = parse_document(
            "\
## Home
- [ ] Open recurring
  - due: 2099-01-01
  - recur: weekly
  - lastDone: 2099-01-01
- [x] Done recurring
  - due: 2099-02-01
  - recur: weekly
  - lastDone: 2099-01-25
",
        );
        let planned = plan_reminders(&doc, FireTime::default(), at("2098-12-31", 0, 0));
        let titles: Vec<&str> = planned.iter().map(|r| r.key.title.as_str()).collect();
        assert_eq!(titles, vec!["Open recurring"]);
    }

    #[test]
    fn test_same_day_before_and_after_fire_time() {
        let doc = sample();
        let before = plan_reminders(&doc, FireTime::new(9, 0), at("2025-06-10", 8, 59));
        assert!(before.iter().any(|r| r.key.title == "Report"));

        let after = plan_reminders(&doc, FireTime::new(9, 0), at("2025-06-10", 9, 0));
        assert!(!after.iter().any(|r| r.key.title == "Report"));
    }

    #[test]
    fn test_duplicate_keys_collapse() {
        let doc = parse_document(
            "## A\n- [ ] Same\n  - due: 2030-01-01\n- [ ] Same\n  - due: 2030-01-01\n",
        );
        let planned = plan_reminders(&doc, FireTime::default(), at("2029-12-31", 0, 0));
        assert_eq!(planned.len(), 1);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let doc = sample();
        let now = at("2025-06-09", 12, 0);
        assert_eq!(
            plan_reminders(&doc, FireTime::new(7, 30), now),
            plan_reminders(&doc, FireTime::new(7, 30), now)
        );
    }
}
