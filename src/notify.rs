//! Access notifications: an event is emitted after a container is opened.
//!
//! Delivery is fire-and-forget. A sink must never block `open` on I/O and
//! nothing it does can change the decryption result.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Who should be told, and who opened the container. Supplied by the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessNotice {
    pub owner_identity: String,
    pub accessor_identity: String,
}

impl AccessNotice {
    pub fn new(owner_identity: impl Into<String>, accessor_identity: impl Into<String>) -> Self {
        Self {
            owner_identity: owner_identity.into(),
            accessor_identity: accessor_identity.into(),
        }
    }
}

/// A successful open of someone's container.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    pub owner_identity: String,
    pub container_name: String,
    pub accessor_identity: String,
    pub opened_at: DateTime<Utc>,
}

impl AccessEvent {
    pub fn new(notice: &AccessNotice, container_name: &str, opened_at: DateTime<Utc>) -> Self {
        Self {
            owner_identity: notice.owner_identity.clone(),
            container_name: container_name.to_owned(),
            accessor_identity: notice.accessor_identity.clone(),
            opened_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Sink trait
// ---------------------------------------------------------------------------

/// Where access events go.
///
/// Synchronous so the pipeline stays runtime-agnostic. Sinks that do I/O
/// hand the event to a background task (see `HttpNotifier`).
pub trait Notifier: Send + Sync {
    fn notify(&self, event: AccessEvent);
}

// ---------------------------------------------------------------------------
// Built-in sinks
// ---------------------------------------------------------------------------

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _event: AccessEvent) {}
}

/// Logs events via the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: AccessEvent) {
        tracing::info!(
            owner = %event.owner_identity,
            container = %event.container_name,
            accessor = %event.accessor_identity,
            opened_at = %event.opened_at,
            "container opened"
        );
    }
}

/// Collects events in memory (for testing).
#[derive(Debug, Default)]
pub struct InMemoryNotifier {
    events: Mutex<Vec<AccessEvent>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AccessEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Notifier for InMemoryNotifier {
    fn notify(&self, event: AccessEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP sink
// ---------------------------------------------------------------------------

#[cfg(feature = "http-notify")]
pub use http::{HttpNotifier, NotificationPayload, DEFAULT_QUEUE_CAPACITY};

#[cfg(feature = "http-notify")]
mod http {
    use std::time::Duration;

    use serde::Serialize;
    use tokio::sync::mpsc::{self, error::TrySendError};
    use tokio::task::JoinHandle;

    use super::{AccessEvent, Notifier};

    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Events waiting for delivery before new ones are dropped.
    pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

    /// JSON body expected by the notification service.
    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct NotificationPayload<'a> {
        pub owner_email: &'a str,
        pub file_name: &'a str,
        pub decrypter_email: &'a str,
    }

    impl<'a> From<&'a AccessEvent> for NotificationPayload<'a> {
        fn from(event: &'a AccessEvent) -> Self {
            Self {
                owner_email: &event.owner_identity,
                file_name: &event.container_name,
                decrypter_email: &event.accessor_identity,
            }
        }
    }

    /// Posts events to an HTTP endpoint from a background task.
    ///
    /// `notify` only enqueues. A full queue, transport errors and non-2xx
    /// responses are logged and the event dropped; there is no retry.
    #[derive(Debug, Clone)]
    pub struct HttpNotifier {
        tx: mpsc::Sender<AccessEvent>,
    }

    impl HttpNotifier {
        /// Start the delivery task on the current tokio runtime.
        pub fn spawn(endpoint: impl Into<String>) -> Result<(Self, JoinHandle<()>), reqwest::Error> {
            Self::spawn_with_capacity(endpoint, DEFAULT_QUEUE_CAPACITY)
        }

        /// As [`spawn`](Self::spawn) with an explicit queue bound (min 1).
        pub fn spawn_with_capacity(
            endpoint: impl Into<String>,
            capacity: usize,
        ) -> Result<(Self, JoinHandle<()>), reqwest::Error> {
            let endpoint = endpoint.into();
            let client = reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()?;
            let (tx, mut rx) = mpsc::channel::<AccessEvent>(capacity.max(1));

            let handle = tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    let payload = NotificationPayload::from(&event);
                    match client.post(&endpoint).json(&payload).send().await {
                        Ok(resp) if resp.status().is_success() => {
                            tracing::debug!(container = %event.container_name, "access notification delivered");
                        }
                        Ok(resp) => {
                            tracing::warn!(status = %resp.status(), endpoint = %endpoint, "notification service rejected event");
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, endpoint = %endpoint, "failed to send access notification");
                        }
                    }
                }
            });

            Ok((Self { tx }, handle))
        }

        fn enqueue(&self, event: AccessEvent) -> Result<(), TrySendError<AccessEvent>> {
            self.tx.try_send(event)
        }
    }

    impl Notifier for HttpNotifier {
        fn notify(&self, event: AccessEvent) {
            match self.enqueue(event) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    tracing::warn!(container = %event.container_name, "notification queue full, dropping access event");
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::warn!("notification task stopped, dropping access event");
                }
            }
        }
    }

}
