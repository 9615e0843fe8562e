//! User-facing notifications
//!
//! A notification is blocking: `notify` returns only once the message has
//! been delivered to the user.

use parking_lot::Mutex;
use std::io::Write;
use tracing::warn;

/// Delivers a message to the end user
pub trait Notifier: Send + Sync {
    /// Show `message` and return once it has been delivered
    fn notify(&self, message: &str);
}

/// Writes notifications to standard error
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, message: &str) {
        let mut stderr = std::io::stderr().lock();
        if let Err(e) = writeln!(stderr, "{}", message).and_then(|_| stderr.flush()) {
            warn!("Failed to deliver notification: {}", e);
        }
    }
}

/// Keeps every notification in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered so far, oldest first
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// Number of messages delivered
    pub fn count(&self) -> usize {
        self.messages.lock().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}
