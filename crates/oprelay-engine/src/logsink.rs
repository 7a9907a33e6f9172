//! Log sink for plugin log records and engine trace events

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use oprelay_api::LogLevel;

/// One recorded message, stamped at sink time
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub recorded_at: DateTime<Utc>,
}

/// Destination for leveled log records.
///
/// Recording never fails and never signals errors back to the caller; a sink
/// that cannot persist drops records rather than disturb the operation it is
/// instrumenting. Records from one execution context keep call order.
pub trait LogSink: Send + Sync {
    fn record(&self, level: LogLevel, message: &str);
}

/// Sink that forwards records to the tracing subscriber
#[derive(Debug, Clone, Default)]
pub struct TracingLogSink;

impl TracingLogSink {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl LogSink for TracingLogSink {
    fn record(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => debug!(target: "oprelay::plugin", "{message}"),
            LogLevel::Info => info!(target: "oprelay::plugin", "{message}"),
            LogLevel::Error => error!(target: "oprelay::plugin", "{message}"),
        }
    }
}

/// Sink that buffers records in memory, in call order.
///
/// Used by tests and by presentation layers that collect an operation's
/// records for later display.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLogSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Messages at or above the given severity
    #[must_use]
    pub fn messages_at_least(&self, level: LogLevel) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|r| r.level >= level)
            .map(|r| r.message)
            .collect()
    }
}

impl LogSink for MemoryLogSink {
    fn record(&self, level: LogLevel, message: &str) {
        let record = LogRecord {
            level,
            message: message.to_string(),
            recorded_at: Utc::now(),
        };
        match self.records.lock() {
            Ok(mut records) => records.push(record),
            // a poisoned buffer still accepts records; the sink never fails
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }
}
