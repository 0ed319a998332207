//! Customer Record Store interface.
//!
//! The single source of truth for customer identity, lifecycle status and the
//! latest audit result. Every mutation is an atomic read-modify-write keyed
//! by customer id; `update_status` emits a `CustomerStatusChanged` event for
//! subscribers.

use crate::errors::AppError;
use crate::models::{AuditResult, Customer, CustomerFilter, CustomerStatus, IntakeRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Result of an idempotent create: the record plus whether it was new.
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub customer: Customer,
    pub created: bool,
}

/// Narrow interface over whatever engine persists customers. The Postgres
/// implementation is the production path; the in-memory implementation backs
/// tests with identical semantics.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Idempotent create keyed on case-insensitive company name OR email.
    /// A repeated request returns the existing record unchanged.
    ///
    /// Fails with `Validation` if required fields are missing or malformed.
    async fn create_or_get(&self, profile: IntakeRequest) -> Result<CreateOutcome, AppError>;

    /// Fetch by id; `NotFound` if unknown.
    async fn get(&self, id: Uuid) -> Result<Customer, AppError>;

    /// Partial status update; emits `CustomerStatusChanged`.
    async fn update_status(
        &self,
        id: Uuid,
        status: CustomerStatus,
        progress: u8,
        message: Option<&str>,
    ) -> Result<(), AppError>;

    /// Transition to `processing` and stamp the audit start time.
    async fn mark_audit_started(&self, id: Uuid) -> Result<(), AppError>;

    /// List customers matching the filter, newest first.
    async fn list(&self, filter: &CustomerFilter) -> Result<Vec<Customer>, AppError>;

    /// Customers stranded in `processing` or `failed` whose last update is
    /// older than the cutoff; candidates for the periodic sweep.
    async fn stale_customers(&self, cutoff: DateTime<Utc>) -> Result<Vec<Customer>, AppError>;

    /// Persist a completed audit result and atomically swap it in as the
    /// customer's latest, marking the customer `completed` at 100%.
    async fn store_result(&self, result: &AuditResult) -> Result<Uuid, AppError>;

    /// The customer's most recent completed result, if any.
    async fn latest_result(&self, customer_id: Uuid) -> Result<Option<AuditResult>, AppError>;
}
