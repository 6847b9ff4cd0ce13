//! File-system watching with stability debouncing.

use std::collections::HashMap;
use std::future::poll_fn;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::time::delay_queue::{DelayQueue, Key};
use tracing::{debug, warn};

use crate::error::Result;

/// Kind of a watched file change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    /// The file appeared.
    Create,
    /// The file's contents changed.
    Update,
    /// The file is gone.
    Delete,
}

/// A stable, deduplicated file change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    /// Kind of change.
    pub kind: FileEventKind,
    /// Path of the changed file.
    pub path: PathBuf,
}

/// Everything the watcher can emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A stable file change.
    File(FileEvent),
    /// A non-fatal failure; the watcher keeps running.
    Error(String),
}

/// Watches a directory tree and emits debounced `create`/`update`/`delete`
/// events.
///
/// On init, `create` events are synthesised for every file already present
/// (via a full recursive walk) before live change notifications are
/// subscribed; consumers see both sources uniformly.
///
/// With a stability threshold configured, `create`/`update` events are
/// withheld until the file's size has stayed unchanged for the full
/// threshold duration, so partially written files are never surfaced as
/// done. Reported deletions are re-checked against the file system before
/// being emitted, because some backends report a deletion for every sibling
/// when one file in a directory is removed.
#[derive(Debug)]
pub struct FileWatcher {
    cancel: CancellationToken,
}

impl FileWatcher {
    /// Starts watching `dir` and returns the event stream.
    pub async fn init(
        dir: impl Into<PathBuf>,
        stability_threshold: Option<Duration>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<WatchEvent>)> {
        let dir = dir.into();

        // Existing files first, so their synthetic creates are ordered
        // before any live event.
        let existing = collect_files(&dir)?;

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(move |result: std::result::Result<Event, notify::Error>| {
                let _ = raw_tx.send(result);
            })?;
        watcher.watch(&dir, RecursiveMode::Recursive)?;

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let debouncer = Debouncer {
            threshold: stability_threshold,
            out: out_tx,
            pending: HashMap::new(),
            timers: DelayQueue::new(),
        };
        tokio::spawn(debouncer.run(watcher, raw_rx, existing, cancel.clone()));

        Ok((Self { cancel }, out_rx))
    }

    /// Stops watching; the event stream ends shortly after.
    pub fn terminate(&self) {
        self.cancel.cancel();
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// A change waiting out its stability window.
#[derive(Debug)]
struct PendingChange {
    kind: FileEventKind,
    size: u64,
    key: Key,
}

struct Debouncer {
    threshold: Option<Duration>,
    out: mpsc::UnboundedSender<WatchEvent>,
    pending: HashMap<PathBuf, PendingChange>,
    timers: DelayQueue<PathBuf>,
}

impl Debouncer {
    async fn run(
        mut self,
        watcher: RecommendedWatcher,
        mut raw: mpsc::UnboundedReceiver<std::result::Result<Event, notify::Error>>,
        existing: Vec<PathBuf>,
        cancel: CancellationToken,
    ) {
        // Keep the OS subscription alive for the task's lifetime.
        let _watcher = watcher;

        for path in existing {
            self.on_change(FileEventKind::Create, path).await;
        }

        loop {
            tokio::select! {
                event = raw.recv() => match event {
                    Some(Ok(event)) => self.on_notify(event).await,
                    Some(Err(e)) => {
                        let _ = self.out.send(WatchEvent::Error(e.to_string()));
                    }
                    None => break,
                },
                expired = poll_fn(|cx| self.timers.poll_expired(cx)), if !self.pending.is_empty() => {
                    if let Some(expired) = expired {
                        self.on_timer(expired.into_inner()).await;
                    }
                }
                () = cancel.cancelled() => break,
            }
        }
        debug!("File watcher stopped");
    }

    async fn on_notify(&mut self, event: Event) {
        let kind = match event.kind {
            EventKind::Create(_) => FileEventKind::Create,
            EventKind::Modify(_) => FileEventKind::Update,
            EventKind::Remove(_) => FileEventKind::Delete,
            _ => return,
        };

        for path in event.paths {
            match kind {
                FileEventKind::Delete => self.on_delete(path).await,
                other => self.on_change(other, path).await,
            }
        }
    }

    /// Handles a reported `create`/`update`, from the initial walk or a
    /// live notification.
    async fn on_change(&mut self, kind: FileEventKind, path: PathBuf) {
        let size = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => return,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // The file is already gone; nothing to report.
                self.drop_pending(&path);
                return;
            }
            Err(e) => {
                let _ = self
                    .out
                    .send(WatchEvent::Error(format!("{}: {e}", path.display())));
                return;
            }
        };

        let Some(threshold) = self.threshold else {
            let _ = self.out.send(WatchEvent::File(FileEvent { kind, path }));
            return;
        };

        match self.pending.get_mut(&path) {
            Some(pending) => {
                // Restart the stability window; the original kind sticks so
                // a creation followed by writes still surfaces as a create.
                pending.size = size;
                self.timers.reset(&pending.key, threshold);
            }
            None => {
                let key = self.timers.insert(path.clone(), threshold);
                self.pending.insert(path, PendingChange { kind, size, key });
            }
        }
    }

    /// Handles a reported deletion, verifying it against the file system.
    async fn on_delete(&mut self, path: PathBuf) {
        match tokio::fs::metadata(&path).await {
            // Still accessible: a spurious sibling deletion, suppress.
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.drop_pending(&path);
                let _ = self.out.send(WatchEvent::File(FileEvent {
                    kind: FileEventKind::Delete,
                    path,
                }));
            }
            Err(e) => {
                let _ = self
                    .out
                    .send(WatchEvent::Error(format!("{}: {e}", path.display())));
            }
        }
    }

    /// A stability window elapsed; emit if the size held steady, re-arm if
    /// the file grew behind our back.
    async fn on_timer(&mut self, path: PathBuf) {
        let Some(pending) = self.pending.get(&path) else {
            return;
        };
        let recorded_size = pending.size;
        let kind = pending.kind;

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.len() == recorded_size => {
                self.pending.remove(&path);
                let _ = self.out.send(WatchEvent::File(FileEvent { kind, path }));
            }
            Ok(meta) => {
                let threshold = self.threshold.unwrap_or_default();
                let key = self.timers.insert(path.clone(), threshold);
                if let Some(pending) = self.pending.get_mut(&path) {
                    pending.size = meta.len();
                    pending.key = key;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Gone before it stabilised; nothing to report.
                self.pending.remove(&path);
            }
            Err(e) => {
                self.pending.remove(&path);
                warn!(path = %path.display(), error = %e, "Stat failed for pending change");
                let _ = self
                    .out
                    .send(WatchEvent::Error(format!("{}: {e}", path.display())));
            }
        }
    }

    fn drop_pending(&mut self, path: &Path) {
        if let Some(pending) = self.pending.remove(path) {
            self.timers.remove(&pending.key);
        }
    }
}

/// Recursively collects all regular files under `dir`.
fn collect_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];

    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }

    files.sort();
    Ok(files)
}
