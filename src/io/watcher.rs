use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Quiet period after the last filesystem event before reloading.
pub const DEBOUNCE: Duration = Duration::from_millis(120);

/// Interval of the polling fallback.
pub const POLL_INTERVAL: Duration = Duration::from_millis(750);

/// A running watch on one task file.
///
/// Three producers feed one channel: an event watcher on the file itself, an
/// event watcher on its directory (catches rename-over saves), and a polling
/// watcher. A single debounce task drains the channel and runs the reload
/// callback once per burst.
pub struct WatchHandle {
    path: PathBuf,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Start watching `path`. Each producer that fails to start is logged and
    /// skipped; with none running the handle is inert but still valid.
    pub fn start<F, Fut>(path: PathBuf, reload: F) -> WatchHandle
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let producers = Producers::start(&path, tx);
        let task = tokio::spawn(debounce_loop(path.clone(), producers, rx, reload));
        tracing::debug!(path = %path.display(), "watching task file");
        WatchHandle { path, task }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop the debounce task and release every watcher. Once this returns no
    /// reload for this path will run.
    pub async fn stop(self) {
        self.task.abort();
        // Cancelled is the expected outcome
        let _ = self.task.await;
        tracing::debug!(path = %self.path.display(), "stopped watching task file");
    }
}

struct Producers {
    path: PathBuf,
    file: Option<RecommendedWatcher>,
    _dir: Option<RecommendedWatcher>,
    _poll: Option<PollWatcher>,
}

impl Producers {
    fn start(path: &Path, tx: mpsc::UnboundedSender<()>) -> Producers {
        let file = watch_file(path, tx.clone());
        let dir = watch_dir(path, tx.clone());
        let poll = watch_poll(path, tx);
        if file.is_none() && dir.is_none() && poll.is_none() {
            tracing::warn!(path = %path.display(), "no file watcher could start; external edits will not be noticed");
        }
        Producers {
            path: path.to_path_buf(),
            file,
            _dir: dir,
            _poll: poll,
        }
    }

    /// Point the file watcher at the current inode again. Atomic saves replace
    /// the file, which silently ends an inode-based watch.
    fn rearm_file(&mut self) {
        if let Some(watcher) = self.file.as_mut() {
            let _ = watcher.unwatch(&self.path);
            if let Err(e) = watcher.watch(&self.path, RecursiveMode::NonRecursive) {
                tracing::debug!(path = %self.path.display(), error = %e, "could not re-arm file watch");
            }
        }
    }
}

fn is_relevant(event: &Event) -> bool {
    !matches!(event.kind, EventKind::Access(_))
}

fn watch_file(path: &Path, tx: mpsc::UnboundedSender<()>) -> Option<RecommendedWatcher> {
    let handler = move |result: Result<Event, notify::Error>| {
        if let Ok(event) = result
            && is_relevant(&event)
        {
            let _ = tx.send(());
        }
    };
    let mut watcher = match RecommendedWatcher::new(handler, Config::default()) {
        Ok(w) => w,
        Err(e) => {
            tracing::warn!(error = %e, "file watcher unavailable");
            return None;
        }
    };
    // A missing file is not fatal: the watch is retried after each reload
    if let Err(e) = watcher.watch(path, RecursiveMode::NonRecursive) {
        tracing::debug!(path = %path.display(), error = %e, "file watch not armed yet");
    }
    Some(watcher)
}

fn watch_dir(path: &Path, tx: mpsc::UnboundedSender<()>) -> Option<RecommendedWatcher> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let name = path.file_name()?.to_os_string();
    let handler = move |result: Result<Event, notify::Error>| {
        if let Ok(event) = result
            && is_relevant(&event)
            && event
                .paths
                .iter()
                .any(|p| p.file_name() == Some(name.as_os_str()))
        {
            let _ = tx.send(());
        }
    };
    let mut watcher = match RecommendedWatcher::new(handler, Config::default()) {
        Ok(w) => w,
        Err(e) => {
            tracing::warn!(error = %e, "directory watcher unavailable");
            return None;
        }
    };
    if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
        tracing::warn!(path = %dir.display(), error = %e, "could not watch directory");
        return None;
    }
    Some(watcher)
}

fn watch_poll(path: &Path, tx: mpsc::UnboundedSender<()>) -> Option<PollWatcher> {
    let handler = move |result: Result<Event, notify::Error>| {
        if let Ok(event) = result
            && is_relevant(&event)
        {
            let _ = tx.send(());
        }
    };
    let config = Config::default().with_poll_interval(POLL_INTERVAL);
    let mut watcher = match PollWatcher::new(handler, config) {
        Ok(w) => w,
        Err(e) => {
            tracing::warn!(error = %e, "polling watcher unavailable");
            return None;
        }
    };
    if let Err(e) = watcher.watch(path, RecursiveMode::NonRecursive) {
        tracing::warn!(path = %path.display(), error = %e, "could not poll task file");
        return None;
    }
    Some(watcher)
}

async fn debounce_loop<F, Fut>(
    path: PathBuf,
    mut producers: Producers,
    mut rx: mpsc::UnboundedReceiver<()>,
    reload: F,
) where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut pending = false;
    let mut last_event = Instant::now();

    loop {
        let wait = DEBOUNCE.saturating_sub(last_event.elapsed());

        tokio::select! {
            event = rx.recv() => {
                match event {
                    Some(()) => {
                        pending = true;
                        last_event = Instant::now();
                    }
                    // Every producer is gone
                    None => break,
                }
            }
            _ = tokio::time::sleep(wait), if pending => {
                pending = false;
                tracing::debug!(path = %path.display(), "task file changed on disk");
                reload().await;
                producers.rearm_file();
            }
        }
    }
}
