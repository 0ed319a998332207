//! Audit event bus.
//!
//! Intake, status changes and completions are published here; the completion
//! notifier and any other subscriber consume them. The periodic sweep remains
//! only as a safety net for missed events.

use crate::models::CustomerStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events emitted by the audit pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum AuditEvent {
    /// A customer record was created by intake.
    CustomerCreated {
        customer_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A customer's status/progress changed.
    CustomerStatusChanged {
        customer_id: Uuid,
        status: CustomerStatus,
        progress: u8,
        message: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// An audit finished and its report artifact is stored.
    AuditCompleted {
        customer_id: Uuid,
        job_id: Uuid,
        report_url: String,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus carrying [`AuditEvent`]s to all subscribers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AuditEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Lagging or absent subscribers are not an error.
    pub fn publish(&self, event: AuditEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::debug!("No event subscribers: {}", e);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(128)
    }
}
