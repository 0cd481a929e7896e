//! Per-owner debug event sink.
//!
//! Each session and the manager own one `DebugLog`. Entries are kept in
//! memory until explicitly cleared so a UI can display them; every entry is
//! also emitted through `tracing`.

use chrono::{DateTime, Local};
use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// Severity of a debug log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        })
    }
}

/// One recorded event.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub owner: String,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.level,
            self.owner,
            self.message
        )
    }
}

#[derive(Debug)]
struct Inner {
    enabled: bool,
    entries: Vec<LogEntry>,
}

/// Append-only event sink with an on/off switch.
#[derive(Debug)]
pub struct DebugLog {
    owner: String,
    inner: Mutex<Inner>,
}

impl DebugLog {
    /// Create an enabled, empty log for `owner`.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            inner: Mutex::new(Inner {
                enabled: true,
                entries: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Record an entry if the log is enabled.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Debug => tracing::debug!(owner = %self.owner, "{message}"),
            LogLevel::Info => tracing::info!(owner = %self.owner, "{message}"),
            LogLevel::Warning => tracing::warn!(owner = %self.owner, "{message}"),
            LogLevel::Error => tracing::error!(owner = %self.owner, "{message}"),
        }

        let mut inner = self.lock();
        if inner.enabled {
            inner.entries.push(LogEntry {
                timestamp: Local::now(),
                level,
                owner: self.owner.clone(),
                message,
            });
        }
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// Switch recording on or off. Turning it on records a marker entry.
    pub fn set_enabled(&self, enabled: bool) {
        let was_enabled = {
            let mut inner = self.lock();
            std::mem::replace(&mut inner.enabled, enabled)
        };
        if enabled && !was_enabled {
            self.info("Debug mode enabled");
        }
    }

    /// Flip the switch and return the new state.
    pub fn toggle(&self) -> bool {
        let enabled = !self.is_enabled();
        self.set_enabled(enabled);
        enabled
    }

    /// Snapshot of all recorded entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_entries_in_order() {
        let log = DebugLog::new("fs");
        log.info("first");
        log.error("second");
        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "first");
        assert_eq!(entries[0].level, LogLevel::Info);
        assert_eq!(entries[1].level, LogLevel::Error);
        assert_eq!(entries[1].owner, "fs");
    }

    #[test]
    fn disabled_log_keeps_old_entries_and_drops_new_ones() {
        let log = DebugLog::new("fs");
        log.info("before");
        assert!(!log.toggle());
        log.info("while disabled");
        log.error("also while disabled");
        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "before");
    }

    #[test]
    fn re_enabling_records_a_marker() {
        let log = DebugLog::new("fs");
        log.set_enabled(false);
        assert!(log.toggle());
        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "Debug mode enabled");
    }

    #[test]
    fn set_enabled_is_idempotent() {
        let log = DebugLog::new("fs");
        log.set_enabled(true);
        assert!(log.is_empty());
    }

    #[test]
    fn clear_removes_everything() {
        let log = DebugLog::new("fs");
        log.warn("a");
        log.warn("b");
        log.clear();
        assert!(log.is_empty());
        assert!(log.is_enabled());
    }

    #[test]
    fn entry_display_format() {
        let log = DebugLog::new("weather");
        log.warn("skipped");
        let rendered = log.entries()[0].to_string();
        assert!(rendered.starts_with('['));
        assert!(rendered.ends_with("] WARNING weather: skipped"));
    }
}
