//! Audit log storage

use crate::error::AuditResult;
use crate::event::AuditEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Audit log storage trait
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append an event
    async fn append(&self, event: &AuditEvent) -> AuditResult<()>;

    /// Count `security.violation` events for a user with a timestamp in
    /// `[start, end]`.
    async fn count_by_user_and_window(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AuditResult<u64>;

    /// Delete events older than `timestamp` (for retention)
    async fn delete_before(&self, timestamp: DateTime<Utc>) -> AuditResult<usize>;
}

fn in_window(event: &AuditEvent, user_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    event.is_violation_by(user_id) && event.timestamp >= start && event.timestamp <= end
}

/// In-memory store
///
/// Clones share the same event list.
#[derive(Clone, Default)]
pub struct MemoryAuditStore {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all events
    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.events.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.lock().await.is_empty()
    }

    /// Clear all events
    pub async fn clear(&self) {
        self.events.lock().await.clear();
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, event: &AuditEvent) -> AuditResult<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }

    async fn count_by_user_and_window(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AuditResult<u64> {
        let events = self.events.lock().await;
        Ok(events
            .iter()
            .filter(|e| in_window(e, user_id, start, end))
            .count() as u64)
    }

    async fn delete_before(&self, timestamp: DateTime<Utc>) -> AuditResult<usize> {
        let mut events = self.events.lock().await;
        let original_len = events.len();
        events.retain(|e| e.timestamp >= timestamp);
        Ok(original_len - events.len())
    }
}

/// File-based store
///
/// Writes events to a file, one JSON object per line. Unparseable lines are
/// skipped on read.
pub struct FileAuditStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileAuditStore {
    /// Create a new file store
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use petshield_audit::*;
    ///
    /// let store = FileAuditStore::new("audit.jsonl");
    /// ```
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Read every parseable event in file order.
    pub async fn read_all(&self) -> AuditResult<Vec<AuditEvent>> {
        let file = match tokio::fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut lines = BufReader::new(file).lines();
        let mut events = Vec::new();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEvent>(&line) {
                Ok(event) => events.push(event),
                Err(e) => warn!(error = %e, path = %self.path.display(), "Skipping malformed audit line"),
            }
        }
        Ok(events)
    }
}

#[async_trait]
impl AuditStore for FileAuditStore {
    async fn append(&self, event: &AuditEvent) -> AuditResult<()> {
        let mut json = event.to_json()?;
        json.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(json.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    async fn count_by_user_and_window(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AuditResult<u64> {
        let events = self.read_all().await?;
        Ok(events
            .iter()
            .filter(|e| in_window(e, user_id, start, end))
            .count() as u64)
    }

    async fn delete_before(&self, timestamp: DateTime<Utc>) -> AuditResult<usize> {
        let _guard = self.write_lock.lock().await;
        let events = self.read_all().await?;
        let original_len = events.len();

        let mut contents = String::new();
        let mut kept = 0;
        for event in events.iter().filter(|e| e.timestamp >= timestamp) {
            contents.push_str(&event.to_json()?);
            contents.push('\n');
            kept += 1;
        }

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        let removed = original_len - kept;
        debug!(removed = removed, path = %self.path.display(), "Applied audit retention");
        Ok(removed)
    }
}
