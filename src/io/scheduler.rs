use std::collections::HashMap;

use chrono::NaiveDateTime;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::io::store::StoreEvent;
use crate::model::config::FireTime;
use crate::model::document::Document;
use crate::ops::reminders::{ReminderKey, plan_reminders};

/// Owns the armed reminder timers for one store.
///
/// Every [`Scheduler::reschedule_all`] starts from a clean slate: all timers
/// are aborted and the plan is rebuilt from the document. Timers are tokio
/// tasks, so a runtime must be active when rescheduling.
pub struct Scheduler {
    timers: HashMap<ReminderKey, JoinHandle<()>>,
    events: broadcast::Sender<StoreEvent>,
}

impl Scheduler {
    pub fn new(events: broadcast::Sender<StoreEvent>) -> Self {
        Scheduler {
            timers: HashMap::new(),
            events,
        }
    }

    /// Cancel every timer, then arm one per pending future reminder.
    /// Returns the number armed.
    pub fn reschedule_all(
        &mut self,
        doc: &Document,
        enabled: bool,
        fire_time: FireTime,
        now: NaiveDateTime,
    ) -> usize {
        self.cancel_all();
        if !enabled {
            tracing::debug!("notifications disabled, no reminders armed");
            return 0;
        }

        for reminder in plan_reminders(doc, fire_time, now) {
            let Ok(delay) = (reminder.fire_at - now).to_std() else {
                continue;
            };
            let events = self.events.clone();
            let key = reminder.key.clone();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                tracing::info!(section = %key.section, title = %key.title, "task due");
                // No subscribers is fine
                let _ = events.send(StoreEvent::TaskDue {
                    title: key.title,
                    section: key.section,
                });
            });
            self.timers.insert(reminder.key, handle);
        }

        tracing::debug!(armed = self.timers.len(), "reminders rescheduled");
        self.timers.len()
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }

    /// Keys of timers that have not fired yet, sorted.
    pub fn armed(&self) -> Vec<ReminderKey> {
        let mut keys: Vec<ReminderKey> = self
            .timers
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
