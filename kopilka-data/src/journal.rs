//! Capped, persisted journals: the application log and the security log.
//!
//! Both are append-only lists that drop their oldest entries past a cap. Every
//! entry is also forwarded to the `log` facade so it shows up on stderr.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::DataResult;
use crate::storage::{KEY_APP_LOGS, KEY_SECURITY_LOGS, KeyValueStore, read_json, write_json};

pub const APP_LOG_CAP: usize = 1000;
pub const SECURITY_LOG_CAP: usize = 100;

/// A bounded list persisted under one key.
#[derive(Debug, Clone)]
pub struct CappedJournal<T> {
    key: &'static str,
    cap: usize,
    entries: Vec<T>,
}

impl<T: Serialize + DeserializeOwned> CappedJournal<T> {
    pub fn new(key: &'static str, cap: usize) -> Self {
        Self {
            key,
            cap,
            entries: Vec::new(),
        }
    }

    /// Load from the store; unreadable or corrupt journals start empty.
    pub fn load(key: &'static str, cap: usize, store: &impl KeyValueStore) -> Self {
        let mut journal = Self::new(key, cap);
        journal.entries = read_json(store, key).unwrap_or_default();
        journal.trim();
        journal
    }

    pub fn push(&mut self, entry: T) {
        self.entries.push(entry);
        self.trim();
    }

    fn trim(&mut self) {
        if self.entries.len() > self.cap {
            let excess = self.entries.len() - self.cap;
            self.entries.drain(..excess);
        }
    }

    pub fn save(&self, store: &mut impl KeyValueStore) -> DataResult<()> {
        write_json(store, self.key, &self.entries)
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ERROR" => Some(LogLevel::Error),
            "WARN" | "WARNING" => Some(LogLevel::Warn),
            "INFO" => Some(LogLevel::Info),
            "DEBUG" => Some(LogLevel::Debug),
            "TRACE" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn as_log(self) -> log::Level {
        match self {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Filters for reading the application log. Empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// Keep entries at this severity or worse
    pub level: Option<LogLevel>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// Case-insensitive substring of the message
    pub search: Option<String>,
}

impl LogFilter {
    fn matches(&self, entry: &LogEntry) -> bool {
        self.level.is_none_or(|l| entry.level <= l)
            && self.since.is_none_or(|s| entry.timestamp >= s)
            && self.until.is_none_or(|u| entry.timestamp <= u)
            && self
                .search
                .as_ref()
                .is_none_or(|q| entry.message.to_lowercase().contains(&q.to_lowercase()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub total_errors: usize,
    /// Errors in the last 24 hours
    pub recent_errors: usize,
    /// Count per `data.type`, "Unknown" when absent
    pub error_types: BTreeMap<String, usize>,
    /// Top 10 messages, most frequent first
    pub most_frequent: Vec<(String, usize)>,
    /// Count per UTC hour of day
    pub errors_by_hour: BTreeMap<u32, usize>,
}

/// The application log kept under `financeAppLogs`.
#[derive(Debug, Clone)]
pub struct AppLog {
    journal: CappedJournal<LogEntry>,
    /// Entries less severe than this are not recorded
    threshold: LogLevel,
}

impl AppLog {
    pub fn new(threshold: LogLevel) -> Self {
        Self {
            journal: CappedJournal::new(KEY_APP_LOGS, APP_LOG_CAP),
            threshold,
        }
    }

    pub fn load(store: &impl KeyValueStore, threshold: LogLevel) -> Self {
        Self {
            journal: CappedJournal::load(KEY_APP_LOGS, APP_LOG_CAP, store),
            threshold,
        }
    }

    /// Record an entry. Returns false when it was below the threshold.
    pub fn record(
        &mut self,
        level: LogLevel,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> bool {
        let message = message.into();
        log::log!(level.as_log(), "{message}");
        if level > self.threshold {
            return false;
        }
        self.journal.push(LogEntry {
            timestamp: now,
            level,
            message,
            data,
        });
        true
    }

    pub fn save(&self, store: &mut impl KeyValueStore) -> DataResult<()> {
        self.journal.save(store)
    }

    /// Matching entries, newest first.
    pub fn query(&self, filter: &LogFilter) -> Vec<&LogEntry> {
        self.journal.entries().iter().rev().filter(|e| filter.matches(e)).collect()
    }

    pub fn len(&self) -> usize {
        self.journal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.journal.is_empty()
    }

    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.journal.clear();
        self.record(LogLevel::Info, "Логи очищены", None, now);
    }

    pub fn error_report(&self, now: DateTime<Utc>) -> ErrorReport {
        let errors = self.query(&LogFilter {
            level: Some(LogLevel::Error),
            ..Default::default()
        });
        let day_ago = now - Duration::hours(24);

        let mut error_types: BTreeMap<String, usize> = BTreeMap::new();
        let mut frequency: BTreeMap<&str, usize> = BTreeMap::new();
        let mut errors_by_hour: BTreeMap<u32, usize> = BTreeMap::new();
        for e in &errors {
            let kind = e
                .data
                .as_ref()
                .and_then(|d| d.get("type"))
                .and_then(|t| t.as_str())
                .unwrap_or("Unknown");
            *error_types.entry(kind.to_string()).or_default() += 1;
            *frequency.entry(e.message.as_str()).or_default() += 1;
            *errors_by_hour.entry(e.timestamp.hour()).or_default() += 1;
        }

        let mut most_frequent: Vec<(String, usize)> =
            frequency.into_iter().map(|(m, c)| (m.to_string(), c)).collect();
        most_frequent.sort_by(|a, b| b.1.cmp(&a.1));
        most_frequent.truncate(10);

        ErrorReport {
            total_errors: errors.len(),
            recent_errors: errors.iter().filter(|e| e.timestamp > day_ago).count(),
            error_types,
            most_frequent,
            errors_by_hour,
        }
    }
}

/// Security event names.
pub mod events {
    pub const LOGIN_SUCCESS: &str = "LOGIN_SUCCESS";
    pub const LOGIN_FAILED: &str = "LOGIN_FAILED";
    pub const BLOCKED_LOGIN: &str = "BLOCKED_LOGIN";
    pub const REGISTRATION_SUCCESS: &str = "REGISTRATION_SUCCESS";
    pub const REGISTRATION_FAILED: &str = "REGISTRATION_FAILED";
    pub const LOGOUT: &str = "LOGOUT";
    pub const SESSION_EXPIRED: &str = "SESSION_EXPIRED";
    pub const SECURITY_VIOLATION: &str = "SECURITY_VIOLATION";

    /// Events that are also raised as warnings.
    pub const CRITICAL: [&str; 3] = [LOGIN_FAILED, SECURITY_VIOLATION, BLOCKED_LOGIN];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub timestamp: DateTime<Utc>,
    pub event: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

/// The security log kept under `securityLogs`.
#[derive(Debug, Clone)]
pub struct SecurityLog {
    journal: CappedJournal<SecurityEvent>,
}

impl Default for SecurityLog {
    fn default() -> Self {
        Self {
            journal: CappedJournal::new(KEY_SECURITY_LOGS, SECURITY_LOG_CAP),
        }
    }
}

impl SecurityLog {
    pub fn load(store: &impl KeyValueStore) -> Self {
        Self {
            journal: CappedJournal::load(KEY_SECURITY_LOGS, SECURITY_LOG_CAP, store),
        }
    }

    pub fn record(&mut self, event: &str, details: serde_json::Value, now: DateTime<Utc>) {
        if events::CRITICAL.contains(&event) {
            log::warn!("security event {event}: {details}");
        } else {
            log::debug!("security event {event}");
        }
        self.journal.push(SecurityEvent {
            timestamp: now,
            event: event.to_string(),
            details,
        });
    }

    pub fn save(&self, store: &mut impl KeyValueStore) -> DataResult<()> {
        self.journal.save(store)
    }

    /// The last `limit` events, oldest first.
    pub fn recent(&self, limit: usize) -> &[SecurityEvent] {
        let entries = self.journal.entries();
        &entries[entries.len().saturating_sub(limit)..]
    }

    pub fn len(&self) -> usize {
        self.journal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.journal.is_empty()
    }
}
