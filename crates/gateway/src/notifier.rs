//! Progress delivery for HTTP actions.
//!
//! Each action gets its own [`ActionSink`]. Events are published on the
//! gateway's in-process [`EventBus`] and, when the caller supplied a
//! `response_url`, POSTed there as JSON. Delivery is fire-and-forget:
//! failures are logged, never retried.

use async_trait::async_trait;
use docforge_core::event::{EventBus, ProgressEvent, ProgressKind, ProgressSink};
use docforge_core::representation::Representation;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Body POSTed to `response_url`, and returned as the immediate acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    #[serde(rename = "type")]
    pub kind: ProgressKind,
    pub message: String,
    pub correlation_id: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub representations: Vec<Representation>,
}

impl ActionResponse {
    /// The empty `thought` sent back while the action runs in the background.
    pub fn acknowledgement(correlation_id: &str, session_id: &str) -> Self {
        Self {
            kind: ProgressKind::Thought,
            message: String::new(),
            correlation_id: correlation_id.to_string(),
            session_id: session_id.to_string(),
            representations: Vec::new(),
        }
    }
}

/// Shared HTTP client for webhook delivery.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    pub async fn deliver(&self, url: &str, body: &ActionResponse) {
        match self.client.post(url).json(body).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(url, status = response.status().as_u16(), "Progress delivered");
            }
            Ok(response) => {
                warn!(url, status = response.status().as_u16(), "Progress endpoint rejected event");
            }
            Err(e) => {
                warn!(url, error = %e, "Progress delivery failed");
            }
        }
    }
}

impl Default for WebhookNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Progress sink for one action.
pub struct ActionSink {
    pub correlation_id: String,
    pub session_id: String,
    pub response_url: Option<String>,
    pub notifier: WebhookNotifier,
    pub events: Arc<EventBus>,
}

#[async_trait]
impl ProgressSink for ActionSink {
    async fn notify(&self, event: ProgressEvent) {
        if let Some(url) = &self.response_url {
            let body = ActionResponse {
                kind: event.kind,
                message: event.message.clone(),
                correlation_id: self.correlation_id.clone(),
                session_id: self.session_id.clone(),
                representations: event.representations.clone(),
            };
            self.notifier.deliver(url, &body).await;
        }
        self.events.publish(event);
    }
}
