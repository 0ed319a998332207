//! Workflow orchestrator.
//!
//! Reacts to the four external triggers: new-customer intake, manual
//! re-trigger, the periodic staleness sweep, and change notifications from
//! other processes. Intake is event-driven; the sweep remains only as a
//! safety net for customers stranded by missed events or crashes.

use crate::errors::AppError;
use crate::events::{AuditEvent, EventBus};
use crate::models::{Customer, CustomerStatus, IntakeRequest, IntakeResponse};
use crate::queue::{AuditQueue, EnqueueOutcome};
use crate::store::CustomerStore;
use crate::validation;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub struct Orchestrator {
    store: Arc<dyn CustomerStore>,
    queue: Arc<AuditQueue>,
    events: EventBus,
    staleness: chrono::Duration,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn CustomerStore>,
        queue: Arc<AuditQueue>,
        events: EventBus,
        staleness_hours: i64,
    ) -> Self {
        Self {
            store,
            queue,
            events,
            staleness: chrono::Duration::hours(staleness_hours),
        }
    }

    /// Trigger 1: new-customer intake. Validates, creates (or returns) the
    /// customer, and enqueues an audit. A validation failure creates
    /// neither a customer nor a job.
    pub async fn intake(&self, request: IntakeRequest) -> Result<IntakeResponse, AppError> {
        validation::validate_intake(&request)?;

        let outcome = self.store.create_or_get(request).await?;
        let customer = outcome.customer;

        if outcome.created {
            self.events.publish(AuditEvent::CustomerCreated {
                customer_id: customer.id,
                timestamp: Utc::now(),
            });
        }

        match self.queue.enqueue(customer.id) {
            EnqueueOutcome::Created(job_id) => {
                tracing::info!(
                    "Intake queued audit job {} for customer {}",
                    job_id,
                    customer.id
                );
            }
            EnqueueOutcome::AlreadyActive(job_id) => {
                tracing::info!(
                    "Intake for customer {} joined active job {}",
                    customer.id,
                    job_id
                );
            }
        }

        Ok(IntakeResponse {
            customer_id: customer.id,
            status: customer.status,
            report_url_when_ready: report_url_for(customer.id),
        })
    }

    /// Trigger 2: manual re-trigger for an existing customer. Idempotent per
    /// the one-active-job invariant.
    pub async fn retrigger(&self, customer_id: Uuid) -> Result<EnqueueOutcome, AppError> {
        let customer = self.store.get(customer_id).await?;

        let outcome = self.queue.enqueue(customer.id);
        if let EnqueueOutcome::Created(job_id) = outcome {
            tracing::info!(
                "Re-triggered audit {} for customer {}",
                job_id,
                customer.id
            );
            self.store
                .update_status(customer.id, CustomerStatus::Queued, 0, Some("Audit queued"))
                .await?;
        }

        Ok(outcome)
    }

    /// Trigger 3: periodic sweep re-queueing customers stuck in `processing`
    /// or `failed` beyond the staleness window. Returns how many were
    /// re-queued.
    pub async fn sweep_once(&self) -> Result<usize, AppError> {
        let cutoff = Utc::now() - self.staleness;
        let stale = self.store.stale_customers(cutoff).await?;

        let mut requeued = 0;
        for customer in stale {
            if let EnqueueOutcome::Created(job_id) = self.queue.enqueue(customer.id) {
                tracing::info!(
                    "Sweep re-queued stale customer {} (job {})",
                    customer.id,
                    job_id
                );
                self.store
                    .update_status(
                        customer.id,
                        CustomerStatus::Queued,
                        0,
                        Some("Audit re-queued by staleness sweep"),
                    )
                    .await?;
                requeued += 1;
            }
        }

        if requeued > 0 {
            tracing::info!("Staleness sweep re-queued {} customer(s)", requeued);
        }

        Ok(requeued)
    }

    /// Background sweep loop.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep_once().await {
                    tracing::warn!("Staleness sweep failed: {}", e);
                }
            }
        })
    }

    /// Trigger 4: another process changed customer data. Cached state cannot
    /// be trusted; re-read from the record store.
    pub async fn customer_changed(&self, customer_id: Uuid) -> Result<Customer, AppError> {
        tracing::debug!("Change notification for customer {}", customer_id);
        self.store.get(customer_id).await
    }
}

/// Where a customer's rendered report is served.
pub fn report_url_for(customer_id: Uuid) -> String {
    format!("/api/v1/customers/{}/report", customer_id)
}
