//! In-memory diagnostic channel
//!
//! [`DiagnosticLog`] is a `tracing_subscriber` layer that keeps every event it
//! sees as a [`DiagnosticRecord`]. Clones share the same buffer, so a test can
//! hand one clone to the subscriber and inspect another.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// One captured event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticRecord {
    /// When the event was recorded
    pub timestamp: DateTime<Utc>,
    /// Level name, upper case
    pub level: String,
    /// Module path or explicit target of the event
    pub target: String,
    /// Formatted message
    pub message: String,
    /// Structured fields other than the message
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

impl DiagnosticRecord {
    /// Whether the record was emitted at `level`
    pub fn is_level(&self, level: Level) -> bool {
        self.level == level.as_str()
    }
}

#[derive(Default)]
struct RecordVisitor {
    message: String,
    fields: BTreeMap<String, String>,
}

impl Visit for RecordVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.insert(field.name().to_string(), value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields
                .insert(field.name().to_string(), format!("{:?}", value));
        }
    }
}

#[derive(Debug, Default)]
struct LogBuffer {
    records: VecDeque<DiagnosticRecord>,
    dropped: usize,
}

/// Shared, bounded buffer of diagnostic records
#[derive(Debug, Clone)]
pub struct DiagnosticLog {
    buffer: Arc<Mutex<LogBuffer>>,
    capacity: Option<usize>,
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticLog {
    /// Create an unbounded log
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(LogBuffer::default())),
            capacity: None,
        }
    }

    /// Create a log that keeps only the most recent `capacity` records
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(LogBuffer::default())),
            capacity: Some(capacity),
        }
    }

    /// Snapshot of all retained records, oldest first
    pub fn records(&self) -> Vec<DiagnosticRecord> {
        self.buffer.lock().records.iter().cloned().collect()
    }

    /// Records emitted at `level`
    pub fn records_at(&self, level: Level) -> Vec<DiagnosticRecord> {
        self.buffer
            .lock()
            .records
            .iter()
            .filter(|r| r.is_level(level))
            .cloned()
            .collect()
    }

    /// Whether any retained message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.buffer
            .lock()
            .records
            .iter()
            .any(|r| r.message.contains(needle))
    }

    /// Number of retained records
    pub fn len(&self) -> usize {
        self.buffer.lock().records.len()
    }

    /// Whether nothing has been retained
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records evicted because the log was full
    pub fn dropped(&self) -> usize {
        self.buffer.lock().dropped
    }

    /// Forget every record
    pub fn clear(&self) {
        let mut buffer = self.buffer.lock();
        buffer.records.clear();
        buffer.dropped = 0;
    }

    /// Export retained records as a JSON array
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.records())
    }

    fn push(&self, record: DiagnosticRecord) {
        let mut buffer = self.buffer.lock();
        if let Some(capacity) = self.capacity {
            if capacity == 0 {
                buffer.dropped += 1;
                return;
            }
            while buffer.records.len() >= capacity {
                buffer.records.pop_front();
                buffer.dropped += 1;
            }
        }
        buffer.records.push_back(record);
    }
}

impl<S: Subscriber> Layer<S> for DiagnosticLog {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);

        let metadata = event.metadata();
        self.push(DiagnosticRecord {
            timestamp: Utc::now(),
            level: metadata.level().as_str().to_string(),
            target: metadata.target().to_string(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}
