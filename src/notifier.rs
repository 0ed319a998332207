use crate::errors::AppError;
use crate::events::{AuditEvent, EventBus};
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Delivers audit-completion notifications to an optional webhook.
///
/// The concrete delivery channel is an external collaborator; without a
/// configured webhook, completions degrade to a log line.
#[derive(Clone)]
pub struct CompletionNotifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl CompletionNotifier {
    /// Creates a new `CompletionNotifier`.
    ///
    /// # Arguments
    ///
    /// * `webhook_url` - Optional endpoint POSTed on every completion.
    pub fn new(webhook_url: Option<String>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::InternalError(format!("Failed to create notifier client: {}", e))
            })?;

        Ok(Self {
            client,
            webhook_url,
        })
    }

    /// Send one completion notification.
    pub async fn notify_completed(
        &self,
        customer_id: Uuid,
        job_id: Uuid,
        report_url: &str,
    ) -> Result<(), AppError> {
        let Some(ref webhook_url) = self.webhook_url else {
            tracing::info!(
                "Audit complete for customer {} (job {}), report at {}",
                customer_id,
                job_id,
                report_url
            );
            return Ok(());
        };

        let body = serde_json::json!({
            "event": "audit_completed",
            "customer_id": customer_id,
            "job_id": job_id,
            "report_url": report_url,
        });

        let response = self
            .client
            .post(webhook_url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Completion webhook failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Provider(format!(
                "Completion webhook returned {}: {}",
                status, error_text
            )));
        }

        tracing::info!("Completion notification sent for customer {}", customer_id);
        Ok(())
    }

    /// Background task forwarding `AuditCompleted` events from the bus.
    /// Delivery failures are logged, never propagated into the pipeline.
    pub fn spawn_listener(self, events: EventBus) -> JoinHandle<()> {
        let mut rx = events.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(AuditEvent::AuditCompleted {
                        customer_id,
                        job_id,
                        report_url,
                        ..
                    }) => {
                        if let Err(e) = self
                            .notify_completed(customer_id, job_id, &report_url)
                            .await
                        {
                            tracing::warn!(
                                "Completion notification for {} failed: {}",
                                customer_id,
                                e
                            );
                        }
                    }
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Notifier lagged, skipped {} event(s)", skipped);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
