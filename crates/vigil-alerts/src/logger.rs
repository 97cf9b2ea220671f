//! Persistent alert log.
//!
//! Every notified alert is appended to the log as one JSON object per line.
//! When the file grows past [`MAX_LOG_SIZE_BYTES`] it is renamed to
//! `<name>.<YYYYmmdd-HHMMSS>` and a background task deletes rotated siblings
//! older than [`LOG_RETENTION`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use vigil_core::{Result, VigilError};

use crate::types::Alert;

/// Size at which the active log is rotated (10 MiB).
pub const MAX_LOG_SIZE_BYTES: u64 = 10 * 1024 * 1024;

/// Age after which rotated logs are deleted.
pub const LOG_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Timestamp format of the rotation suffix.
pub const ROTATION_SUFFIX_FORMAT: &str = "%Y%m%d-%H%M%S";

/// One line of the alert log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertLogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub title: String,
    pub message: String,
    pub source: String,
    pub id: String,
}

impl From<&Alert> for AlertLogEntry {
    fn from(alert: &Alert) -> Self {
        Self {
            timestamp: alert.timestamp,
            level: alert.level.as_str().to_string(),
            title: alert.title.clone(),
            message: alert.message.clone(),
            source: alert.source.clone(),
            id: alert.id.clone(),
        }
    }
}

/// Append-only JSON-lines alert logger with size-based rotation.
#[derive(Debug)]
pub struct AlertLogger {
    path: PathBuf,
    max_size: u64,
    retention: Duration,
    // Serializes append + rotate so concurrent notifications never interleave.
    write_lock: Mutex<()>,
}

impl AlertLogger {
    /// Create a logger writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_size: MAX_LOG_SIZE_BYTES,
            retention: LOG_RETENTION,
            write_lock: Mutex::new(()),
        }
    }

    /// Override the rotation size ceiling.
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    /// Override the retention window for rotated files.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Path of the active log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry for `alert`, rotating afterwards if the file is too big.
    pub async fn log_alert(&self, alert: &Alert) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(dir) = self.log_dir() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| VigilError::DirectoryCreation {
                    path: dir.to_path_buf(),
                    source: e,
                })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| VigilError::io("opening alert log", &self.path, e))?;

        let mut line = serde_json::to_string(&AlertLogEntry::from(alert))
            .map_err(|e| VigilError::json("alert log entry", e))?;
        line.push('\n');

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| VigilError::io("writing alert log", &self.path, e))?;
        file.flush()
            .await
            .map_err(|e| VigilError::io("flushing alert log", &self.path, e))?;

        let size = file
            .metadata()
            .await
            .map_err(|e| VigilError::io("reading alert log size", &self.path, e))?
            .len();
        drop(file);

        if size > self.max_size {
            self.rotate().await;
        }

        Ok(())
    }

    /// Rotated siblings of the active log, oldest name first.
    pub fn rotated_files(&self) -> Result<Vec<PathBuf>> {
        let Some(prefix) = self.rotation_prefix() else {
            return Ok(Vec::new());
        };
        let dir = self.log_dir().unwrap_or_else(|| Path::new("."));

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(VigilError::io("listing alert log directory", dir, e)),
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix))
            })
            .collect();
        files.sort();
        Ok(files)
    }

    fn log_dir(&self) -> Option<&Path> {
        self.path.parent().filter(|p| !p.as_os_str().is_empty())
    }

    fn rotation_prefix(&self) -> Option<String> {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| format!("{n}."))
    }

    /// Rename the active log and schedule cleanup of old rotations.
    ///
    /// Failures are logged; the next write simply keeps appending.
    async fn rotate(&self) {
        let Some(prefix) = self.rotation_prefix() else {
            return;
        };
        let stamp = Utc::now().format(ROTATION_SUFFIX_FORMAT).to_string();
        let mut target = self.path.with_file_name(format!("{prefix}{stamp}"));
        let mut n = 1;
        while tokio::fs::try_exists(&target).await.unwrap_or(false) {
            target = self.path.with_file_name(format!("{prefix}{stamp}-{n}"));
            n += 1;
        }

        if let Err(e) = tokio::fs::rename(&self.path, &target).await {
            warn!(path = %self.path.display(), error = %e, "alert log rotation failed");
            return;
        }
        info!(rotated = %target.display(), "rotated alert log");

        let dir = self
            .log_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let retention = self.retention;
        tokio::spawn(async move {
            prune_rotated(&dir, &prefix, retention).await;
        });
    }
}

/// Delete files in `dir` named `<prefix>*` that were last modified more than
/// `retention` ago.
pub(crate) async fn prune_rotated(dir: &Path, prefix: &str, retention: Duration) -> usize {
    let cutoff = SystemTime::now()
        .checked_sub(retention)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot scan alert log directory");
            return 0;
        }
    };

    let mut removed = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        if !name.to_str().is_some_and(|n| n.starts_with(prefix)) {
            continue;
        }

        let modified = match entry.metadata().await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => continue,
        };
        if modified >= cutoff {
            continue;
        }

        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => {
                debug!(path = %entry.path().display(), "deleted expired alert log");
                removed += 1;
            }
            Err(e) => warn!(
                path = %entry.path().display(),
                error = %e,
                "cannot delete expired alert log"
            ),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AlertLevel;
    use tempfile::TempDir;

    fn alert(n: usize) -> Alert {
        Alert::new(AlertLevel::Warning, format!("alert {n}"), "x".repeat(64), "test")
            .with_id(format!("test-{n}"))
    }

    #[tokio::test]
    async fn test_writes_one_json_line_per_alert() {
        let dir = TempDir::new().unwrap();
        let logger = AlertLogger::new(dir.path().join("logs").join("alerts.log"));

        logger.log_alert(&alert(1)).await.unwrap();
        logger.log_alert(&alert(2)).await.unwrap();

        let contents = std::fs::read_to_string(logger.path()).unwrap();
        let entries: Vec<AlertLogEntry> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "test-1");
        assert_eq!(entries[1].level, "warning");
        assert_eq!(entries[1].source, "test");
    }

    #[tokio::test]
    async fn test_rotation_produces_single_timestamped_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("alerts.log");
        let logger = AlertLogger::new(&path).with_max_size(1024);

        let mut n = 0;
        while logger.rotated_files().unwrap().is_empty() {
            n += 1;
            logger.log_alert(&alert(n)).await.unwrap();
            assert!(n < 100, "log never rotated");
        }

        let rotated = logger.rotated_files().unwrap();
        assert_eq!(rotated.len(), 1);
        let name = rotated[0].file_name().unwrap().to_str().unwrap().to_string();
        let suffix = name.strip_prefix("alerts.log.").unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(suffix, ROTATION_SUFFIX_FORMAT).is_ok());
        assert!(std::fs::metadata(&rotated[0]).unwrap().len() > 1024);

        // Active file starts over on the next write.
        assert!(!path.exists());
        logger.log_alert(&alert(n + 1)).await.unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert_eq!(logger.rotated_files().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_prune_removes_only_expired_rotations() {
        let dir = TempDir::new().unwrap();
        let active = dir.path().join("alerts.log");
        let old = dir.path().join("alerts.log.20200101-000000");
        let fresh = dir.path().join("alerts.log.20990101-000000");
        let unrelated = dir.path().join("other.log.20200101-000000");
        for path in [&active, &old, &fresh, &unrelated] {
            std::fs::write(path, "{}\n").unwrap();
        }

        let two_weeks_ago = SystemTime::now() - Duration::from_secs(14 * 24 * 60 * 60);
        for path in [&old, &unrelated] {
            std::fs::File::options()
                .write(true)
                .open(path)
                .unwrap()
                .set_modified(two_weeks_ago)
                .unwrap();
        }

        let removed = prune_rotated(dir.path(), "alerts.log.", LOG_RETENTION).await;
        assert_eq!(removed, 1);
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(active.exists());
        assert!(unrelated.exists());
    }

    #[tokio::test]
    async fn test_unwritable_location_is_an_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let logger = AlertLogger::new(blocker.join("alerts.log"));
        let err = logger.log_alert(&alert(1)).await.unwrap_err();
        assert!(matches!(err, VigilError::DirectoryCreation { .. }));
    }
}
