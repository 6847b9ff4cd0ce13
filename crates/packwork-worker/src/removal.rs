//! Delayed file removal: durable, TTL-based eviction.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;

/// Name of the ledger sidecar file inside the managed folder.
pub const LEDGER_FILE_NAME: &str = ".packwork-removals.json";

/// A scheduled future deletion.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DelayedRemovalEntry {
    /// File to delete.
    pub file_path: PathBuf,
    /// Wall-clock time after which the file may be deleted.
    pub remove_time: DateTime<Utc>,
}

/// Schedules and durably tracks future file deletions.
///
/// The ledger is a JSON array persisted to a sidecar file in the managed
/// folder; it is the sole durable record of pending deletions, so it
/// survives process restarts. Losing the file cancels all pending removals
/// (files become permanent), which is acceptable degradation rather than
/// corruption.
///
/// The ledger file may be written by concurrent actors; [`remove_due`]
/// re-reads it before committing, which reduces (but does not eliminate)
/// the race window.
///
/// [`remove_due`]: RemovalLedger::remove_due
#[derive(Debug, Clone)]
pub struct RemovalLedger {
    ledger_path: PathBuf,
}

impl RemovalLedger {
    /// Creates a ledger for the given managed folder.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            ledger_path: dir.as_ref().join(LEDGER_FILE_NAME),
        }
    }

    /// Path of the ledger sidecar file.
    #[must_use]
    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    /// Schedules `path` for deletion at `now + ttl`.
    ///
    /// Upsert: an existing entry's removal time is extended, never
    /// shortened, so repeated access keeps pushing eviction back. There is
    /// never more than one entry per path.
    pub async fn delay_removal(&self, path: impl AsRef<Path>, ttl: Duration) -> Result<()> {
        let path = path.as_ref();
        let now = Utc::now();
        let remove_time = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut entries = self.read_entries().await?;
        match entries.iter_mut().find(|e| e.file_path == path) {
            Some(entry) => {
                if remove_time > entry.remove_time {
                    entry.remove_time = remove_time;
                }
            }
            None => entries.push(DelayedRemovalEntry {
                file_path: path.to_path_buf(),
                remove_time,
            }),
        }

        self.write_entries(&entries).await?;
        debug!(path = %path.display(), remove_time = %remove_time, "Removal delayed");
        Ok(())
    }

    /// Cancels any pending removal of `path`; the file becomes permanent.
    pub async fn clear_removal(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut entries = self.read_entries().await?;
        let before = entries.len();
        entries.retain(|e| e.file_path != path);

        if entries.len() != before {
            self.write_entries(&entries).await?;
            debug!(path = %path.display(), "Removal cleared");
        }
        Ok(())
    }

    /// Deletes all files whose removal time has passed.
    ///
    /// Files that are already gone count as processed. The ledger is
    /// re-read from disk before the processed entries are dropped, so a
    /// concurrent writer's additions are preserved. Entries whose removal
    /// time is still in the future are never touched.
    ///
    /// Returns the number of entries processed.
    pub async fn remove_due(&self) -> Result<usize> {
        let entries = self.read_entries().await?;
        let now = Utc::now();

        let mut processed: Vec<PathBuf> = Vec::new();
        for entry in entries.iter().filter(|e| e.remove_time <= now) {
            match tokio::fs::remove_file(&entry.file_path).await {
                Ok(()) => {
                    info!(path = %entry.file_path.display(), "Removed expired file");
                    processed.push(entry.file_path.clone());
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    processed.push(entry.file_path.clone());
                }
                Err(e) => {
                    // Keep the entry; the next cycle retries.
                    warn!(path = %entry.file_path.display(), error = %e, "Failed to remove file");
                }
            }
        }

        if processed.is_empty() {
            return Ok(0);
        }

        let mut fresh = self.read_entries().await?;
        fresh.retain(|e| !processed.contains(&e.file_path));
        self.write_entries(&fresh).await?;

        Ok(processed.len())
    }

    /// Current ledger contents; a missing ledger file reads as empty.
    pub async fn read_entries(&self) -> Result<Vec<DelayedRemovalEntry>> {
        match tokio::fs::read(&self.ledger_path).await {
            Ok(contents) => Ok(serde_json::from_slice(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_entries(&self, entries: &[DelayedRemovalEntry]) -> Result<()> {
        let contents = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&self.ledger_path, contents).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn delay_creates_single_entry() {
        let dir = TempDir::new().unwrap();
        let ledger = RemovalLedger::new(dir.path());
        let file = dir.path().join("package.bin");

        ledger
            .delay_removal(&file, Duration::from_secs(60))
            .await
            .unwrap();
        let entries = ledger.read_entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_path, file);
    }

    #[tokio::test]
    async fn repeated_delay_extends_never_shortens() {
        let dir = TempDir::new().unwrap();
        let ledger = RemovalLedger::new(dir.path());
        let file = dir.path().join("package.bin");

        ledger
            .delay_removal(&file, Duration::from_secs(60))
            .await
            .unwrap();
        let first = ledger.read_entries().await.unwrap()[0].remove_time;

        // A longer TTL pushes the removal back, still one entry.
        ledger
            .delay_removal(&file, Duration::from_secs(600))
            .await
            .unwrap();
        let entries = ledger.read_entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].remove_time > first);
        let extended = entries[0].remove_time;

        // A shorter TTL never pulls it forward.
        ledger
            .delay_removal(&file, Duration::from_secs(1))
            .await
            .unwrap();
        let entries = ledger.read_entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].remove_time, extended);
    }

    #[tokio::test]
    async fn clear_drops_the_entry() {
        let dir = TempDir::new().unwrap();
        let ledger = RemovalLedger::new(dir.path());
        let file = dir.path().join("package.bin");

        ledger
            .delay_removal(&file, Duration::from_secs(60))
            .await
            .unwrap();
        ledger.clear_removal(&file).await.unwrap();
        assert!(ledger.read_entries().await.unwrap().is_empty());

        // Clearing an unknown path is a no-op.
        ledger.clear_removal(&file).await.unwrap();
    }

    #[tokio::test]
    async fn remove_due_deletes_only_expired_files() {
        let dir = TempDir::new().unwrap();
        let ledger = RemovalLedger::new(dir.path());
        let expired = dir.path().join("old.bin");
        let fresh = dir.path().join("new.bin");
        std::fs::write(&expired, b"old").unwrap();
        std::fs::write(&fresh, b"new").unwrap();

        ledger
            .delay_removal(&expired, Duration::ZERO)
            .await
            .unwrap();
        ledger
            .delay_removal(&fresh, Duration::from_secs(3600))
            .await
            .unwrap();

        let processed = ledger.remove_due().await.unwrap();
        assert_eq!(processed, 1);

        assert!(!expired.exists());
        assert!(fresh.exists());

        let entries = ledger.read_entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_path, fresh);
    }

    #[tokio::test]
    async fn remove_due_absorbs_already_gone_files() {
        let dir = TempDir::new().unwrap();
        let ledger = RemovalLedger::new(dir.path());
        let ghost = dir.path().join("ghost.bin");

        ledger.delay_removal(&ghost, Duration::ZERO).await.unwrap();

        let processed = ledger.remove_due().await.unwrap();
        assert_eq!(processed, 1);
        assert!(ledger.read_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_due_preserves_concurrent_additions() {
        let dir = TempDir::new().unwrap();
        let ledger = RemovalLedger::new(dir.path());
        let expired = dir.path().join("old.bin");
        std::fs::write(&expired, b"old").unwrap();

        ledger
            .delay_removal(&expired, Duration::ZERO)
            .await
            .unwrap();

        // Simulate a concurrent writer appending between the delete and
        // the commit: the re-read keeps its entry.
        let other = RemovalLedger::new(dir.path());
        other
            .delay_removal(dir.path().join("late.bin"), Duration::from_secs(3600))
            .await
            .unwrap();

        ledger.remove_due().await.unwrap();

        let entries = ledger.read_entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].file_path.ends_with("late.bin"));
    }

    #[tokio::test]
    async fn missing_ledger_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let ledger = RemovalLedger::new(dir.path());

        assert!(ledger.read_entries().await.unwrap().is_empty());
        assert_eq!(ledger.remove_due().await.unwrap(), 0);
    }
}
