use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use tokio::sync::{Mutex, RwLock, broadcast};

use crate::io::doc_io::{self, StoreError};
use crate::io::ledger_io;
use crate::io::scheduler::Scheduler;
use crate::io::watcher::WatchHandle;
use crate::model::config::Settings;
use crate::model::document::Document;
use crate::ops::recurrence::{RolloverLedger, toggle_on};
use crate::ops::reminders::ReminderKey;
use crate::ops::task_ops::{self, Mutation};
use crate::parse::{parse_document, serialize_document};

const EVENT_CAPACITY: usize = 64;

/// Events broadcast to subscribers of a [`TaskStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// The file changed, locally or on disk. Re-read to see it.
    Changed,
    /// A reminder fired
    TaskDue { title: String, section: String },
}

/// Handle to one markdown task file: reads, mutations, live reload and
/// reminders. Clones share the same state.
#[derive(Clone)]
pub struct TaskStore {
    inner: Arc<Inner>,
}

struct Inner {
    path: RwLock<PathBuf>,
    settings: RwLock<Settings>,
    events: broadcast::Sender<StoreEvent>,
    scheduler: Mutex<Scheduler>,
    ledger: Mutex<RolloverLedger>,
    /// Hash of the content last written or reloaded; `None` when missing
    fingerprint: Mutex<Option<u64>>,
    /// Serializes read-modify-write cycles and reloads
    write_lock: Mutex<()>,
    watch: Mutex<Option<WatchHandle>>,
}

fn fingerprint(text: Option<&str>) -> Option<u64> {
    text.map(|t| {
        let mut hasher = DefaultHasher::new();
        t.hash(&mut hasher);
        hasher.finish()
    })
}

async fn blocking<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

impl TaskStore {
    pub fn new(path: impl Into<PathBuf>, settings: Settings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        TaskStore {
            inner: Arc::new(Inner {
                path: RwLock::new(path.into()),
                settings: RwLock::new(settings),
                scheduler: Mutex::new(Scheduler::new(events.clone())),
                events,
                ledger: Mutex::new(RolloverLedger::new()),
                fingerprint: Mutex::new(None),
                write_lock: Mutex::new(()),
                watch: Mutex::new(None),
            }),
        }
    }

    pub async fn path(&self) -> PathBuf {
        self.inner.path.read().await.clone()
    }

    pub async fn settings(&self) -> Settings {
        self.inner.settings.read().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.events.subscribe()
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }

    /// Parse the file as it is now. A missing file reads as an empty document
    /// and is not created.
    pub async fn read(&self) -> Result<Document, StoreError> {
        let path = self.path().await;
        blocking(move || doc_io::load_document(&path)).await
    }

    /// Create the file with an `Inbox` section if it is missing. Returns
    /// whether it was created.
    pub async fn ensure_file(&self) -> Result<bool, StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        let path = self.path().await;
        let created = self.ensure_at(&path).await?;
        if created {
            self.emit(StoreEvent::Changed);
        }
        Ok(created)
    }

    async fn ensure_at(&self, path: &Path) -> Result<bool, StoreError> {
        let target = path.to_path_buf();
        let created = blocking(move || doc_io::ensure_file(&target)).await?;
        if created {
            tracing::info!(path = %path.display(), "created task file");
            let text = serialize_document(&Document::with_default_section());
            *self.inner.fingerprint.lock().await = fingerprint(Some(&text));
        }
        Ok(created)
    }

    /// Apply one mutation to the file and return the resulting document.
    ///
    /// When the document changed, the write lands before `Changed` is sent
    /// and reminders are rebuilt. A mutation that changes nothing writes
    /// nothing.
    pub async fn mutate(&self, mutation: Mutation) -> Result<Document, StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        let path = self.path().await;
        let created = self.ensure_at(&path).await?;

        let source = path.clone();
        let original = blocking(move || doc_io::read_text(&source))
            .await?
            .unwrap_or_default();
        let mut doc = parse_document(&original);
        let toggled = matches!(mutation, Mutation::ToggleTask { .. });
        let changed = self.apply(&path, &mut doc, mutation).await?;
        doc.renumber();

        if changed {
            let target = path.clone();
            let snapshot = doc.clone();
            let written = blocking(move || {
                doc_io::log_dropped_lines(&target, &original);
                doc_io::save_document(&target, &snapshot)
            })
            .await?;
            *self.inner.fingerprint.lock().await = fingerprint(Some(&written));
            tracing::debug!(path = %path.display(), "task file written");
            if toggled {
                self.save_ledger(&path).await;
            }
        }
        if changed || created {
            self.emit(StoreEvent::Changed);
            self.reschedule_doc(&doc).await;
        }
        Ok(doc)
    }

    async fn apply(
        &self,
        path: &Path,
        doc: &mut Document,
        mutation: Mutation,
    ) -> Result<bool, StoreError> {
        let recurring = self.inner.settings.read().await.features.recurring;
        match mutation {
            Mutation::ToggleTask { section, task_id } if recurring => {
                let today = Local::now().date_naive();
                let source = path.to_path_buf();
                let saved = blocking(move || Ok(ledger_io::read_ledger(&source, today))).await?;
                let mut ledger = self.inner.ledger.lock().await;
                ledger.absorb(saved);
                match toggle_on(doc, &section, &task_id, today, &mut ledger) {
                    Some(outcome) => {
                        tracing::debug!(section = %section, task_id = %task_id, ?outcome, "toggled task");
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
            other => Ok(task_ops::apply(doc, other)),
        }
    }

    /// Persist today's rollovers beside the task file, so a later process
    /// can still undo them exactly.
    async fn save_ledger(&self, path: &Path) {
        let ledger = {
            let mut ledger = self.inner.ledger.lock().await;
            ledger.prune(Local::now().date_naive());
            ledger.clone()
        };
        let target = path.to_path_buf();
        let result = blocking(move || Ok(ledger_io::write_ledger(&target, &ledger)?)).await;
        if let Err(e) = result {
            tracing::warn!(path = %path.display(), error = %e, "could not save rollover ledger");
        }
    }

    /// Rebuild reminders from the file. Returns how many are armed.
    pub async fn reschedule(&self) -> Result<usize, StoreError> {
        let doc = self.read().await?;
        Ok(self.reschedule_doc(&doc).await)
    }

    async fn reschedule_doc(&self, doc: &Document) -> usize {
        let settings = self.settings().await;
        let now = Local::now().naive_local();
        self.inner.scheduler.lock().await.reschedule_all(
            doc,
            settings.features.notifications,
            settings.notification_time,
            now,
        )
    }

    /// Reminders currently waiting to fire.
    pub async fn armed_reminders(&self) -> Vec<ReminderKey> {
        self.inner.scheduler.lock().await.armed()
    }

    /// Replace the settings and rebuild reminders for them.
    pub async fn set_settings(&self, settings: Settings) -> Result<usize, StoreError> {
        *self.inner.settings.write().await = settings;
        self.reschedule().await
    }

    /// Point the store at another file. The old watch is fully stopped and
    /// every timer cancelled before anything runs against the new path.
    pub async fn set_path(&self, path: impl Into<PathBuf>) -> Result<(), StoreError> {
        let path = path.into();
        let was_watching = self.stop_watching().await;
        {
            let _guard = self.inner.write_lock.lock().await;
            self.inner.scheduler.lock().await.cancel_all();
            self.inner.ledger.lock().await.clear();
            *self.inner.fingerprint.lock().await = None;
            *self.inner.path.write().await = path.clone();
        }
        tracing::info!(path = %path.display(), "switched task file");

        self.reschedule().await?;
        if was_watching {
            self.start_watching().await;
        }
        self.emit(StoreEvent::Changed);
        Ok(())
    }

    /// Start live reload of external edits. Restarts the watch if one is
    /// already running.
    pub async fn start_watching(&self) {
        self.stop_watching().await;

        let path = self.path().await;
        {
            let _guard = self.inner.write_lock.lock().await;
            let source = path.clone();
            let current = match blocking(move || doc_io::read_text(&source)).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "could not read task file");
                    None
                }
            };
            *self.inner.fingerprint.lock().await = fingerprint(current.as_deref());
        }

        let weak = Arc::downgrade(&self.inner);
        let handle = WatchHandle::start(path, move || {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    TaskStore { inner }.reload_external().await;
                }
            }
        });
        *self.inner.watch.lock().await = Some(handle);
    }

    /// Stop live reload. Returns whether a watch was running.
    pub async fn stop_watching(&self) -> bool {
        let handle = self.inner.watch.lock().await.take();
        match handle {
            Some(handle) => {
                handle.stop().await;
                true
            }
            None => false,
        }
    }

    pub async fn is_watching(&self) -> bool {
        self.inner.watch.lock().await.is_some()
    }

    /// Called after a settled burst of filesystem events. Content identical
    /// to the last write or reload is ignored, so local writes are announced
    /// once.
    async fn reload_external(&self) {
        let _guard = self.inner.write_lock.lock().await;
        let path = self.path().await;
        let source = path.clone();
        let text = match blocking(move || doc_io::read_text(&source)).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "reload failed");
                return;
            }
        };

        let current = fingerprint(text.as_deref());
        {
            let mut known = self.inner.fingerprint.lock().await;
            if *known == current {
                tracing::trace!(path = %path.display(), "no content change");
                return;
            }
            *known = current;
        }

        tracing::info!(path = %path.display(), "task file changed externally");
        let doc = text.map(|t| parse_document(&t)).unwrap_or_default();
        self.emit(StoreEvent::Changed);
        self.reschedule_doc(&doc).await;
    }

    /// Stop watching and cancel all reminders.
    pub async fn shutdown(&self) {
        self.stop_watching().await;
        self.inner.scheduler.lock().await.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint() {
        assert_eq!(fingerprint(None), None);
        assert_eq!(fingerprint(Some("a")), fingerprint(Some("a")));
        assert_ne!(fingerprint(Some("a")), fingerprint(Some("b")));
        assert_ne!(fingerprint(Some("")), None);
    }
}
