//! User-visible notifications.
//!
//! Failures of background work (refreshes triggered by events, size
//! recomputation) have no caller to return to, so they are published here
//! for whatever front end is attached.

use std::fmt;

use chrono::{DateTime, Local};
use tokio::sync::broadcast;

/// Maximum number of notifications buffered per subscriber.
const NOTIFICATION_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub level: Level,
    pub message: String,
    pub at: DateTime<Local>,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            Level::Info => "info",
            Level::Error => "error",
        };
        write!(f, "[{}] {}: {}", self.at.format("%H:%M:%S"), tag, self.message)
    }
}

/// Broadcasts notifications to every subscriber.
///
/// Sending with no subscribers is not an error; the notification is
/// simply dropped.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTIFICATION_BUFFER);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn info(&self, message: impl Into<String>) {
        self.publish(Level::Info, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.publish(Level::Error, message.into());
    }

    fn publish(&self, level: Level, message: String) {
        let _ = self.tx.send(Notification {
            level,
            message,
            at: Local::now(),
        });
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
