//! Progress notifications: the one outbound message every action emits.
//!
//! The engine hands a [`ProgressEvent`] to a [`ProgressSink`] and moves on.
//! Delivery is fire-and-forget: sinks log their own failures and never
//! report them back.

use crate::representation::Representation;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// What a progress notification carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressKind {
    /// A user-visible result.
    Output,
    /// An interim acknowledgement.
    Thought,
}

/// A notification about one finished (or acknowledged) action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: ProgressKind,

    pub message: String,

    /// Session state at the time of the notification.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub representations: Vec<Representation>,

    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn output(message: impl Into<String>, representations: Vec<Representation>) -> Self {
        Self {
            kind: ProgressKind::Output,
            message: message.into(),
            representations,
            timestamp: Utc::now(),
        }
    }

    pub fn thought(message: impl Into<String>) -> Self {
        Self {
            kind: ProgressKind::Thought,
            message: message.into(),
            representations: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}

/// Receiver of progress notifications.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn notify(&self, event: ProgressEvent);
}

/// A broadcast-based event bus for progress events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Useful for
/// in-process consumers such as the CLI and tests.
pub struct EventBus {
    sender: broadcast::Sender<Arc<ProgressEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: ProgressEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ProgressEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl ProgressSink for EventBus {
    async fn notify(&self, event: ProgressEvent) {
        self.publish(event);
    }
}
