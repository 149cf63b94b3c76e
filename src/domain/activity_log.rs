//! Activity log (C8): bounded, newest-first ring of human-readable lines.
//!
//! Not persisted — restarting the process clears it, consistent with the
//! core's in-memory-by-design stance.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

const CAP: usize = 50;

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

#[derive(Default)]
pub struct ActivityLog {
    entries: Mutex<VecDeque<LogEntry>>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, message: impl Into<String>) {
        let mut entries = self.entries.lock().unwrap();
        entries.push_front(LogEntry {
            timestamp: Utc::now(),
            message: message.into(),
        });
        entries.truncate(CAP);
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().iter().cloned().collect()
    }
}
