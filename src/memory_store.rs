//! In-memory Customer Record Store.
//!
//! Mirrors the Postgres implementation's semantics behind the same trait;
//! backs the integration tests and any deployment that opts out of
//! durability.

use crate::errors::AppError;
use crate::events::{AuditEvent, EventBus};
use crate::models::{AuditResult, Customer, CustomerFilter, CustomerStatus, IntakeRequest};
use crate::store::{CreateOutcome, CustomerStore};
use crate::validation;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    customers: HashMap<Uuid, Customer>,
    results: HashMap<Uuid, AuditResult>,
}

pub struct MemoryCustomerStore {
    state: RwLock<MemoryState>,
    events: EventBus,
}

impl MemoryCustomerStore {
    pub fn new(events: EventBus) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            events,
        }
    }
}

fn matches_filter(customer: &Customer, filter: &CustomerFilter) -> bool {
    if let Some(status) = filter.status {
        if customer.status != status {
            return false;
        }
    }

    if let Some(ref q) = filter.q {
        let needle = q.to_lowercase();
        let haystacks = [
            Some(customer.company_name.as_str()),
            Some(customer.email.as_str()),
            Some(customer.website.as_str()),
            customer.industry.as_deref(),
            customer.location.as_deref(),
        ];
        if !haystacks
            .iter()
            .flatten()
            .any(|h| h.to_lowercase().contains(&needle))
        {
            return false;
        }
    }

    if let Some(from) = filter.created_from {
        if customer.created_at < from {
            return false;
        }
    }

    if let Some(to) = filter.created_to {
        if customer.created_at > to {
            return false;
        }
    }

    true
}

#[async_trait]
impl CustomerStore for MemoryCustomerStore {
    async fn create_or_get(&self, profile: IntakeRequest) -> Result<CreateOutcome, AppError> {
        validation::validate_intake(&profile)?;

        let mut state = self.state.write().await;

        let company = profile.company_name.trim().to_lowercase();
        let email = profile.email.trim().to_lowercase();

        if let Some(existing) = state.customers.values().find(|c| {
            c.company_name.to_lowercase() == company || c.email.to_lowercase() == email
        }) {
            return Ok(CreateOutcome {
                customer: existing.clone(),
                created: false,
            });
        }

        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4(),
            slug: validation::slugify(&profile.company_name),
            company_name: profile.company_name.trim().to_string(),
            contact_name: profile.contact_name,
            email: profile.email.trim().to_string(),
            phone: profile.phone,
            website: profile.website.trim().to_string(),
            industry: profile.industry,
            location: profile.location,
            competitors: profile.competitors,
            target_keywords: profile.target_keywords,
            status: CustomerStatus::Queued,
            progress: 0,
            status_message: None,
            created_at: now,
            updated_at: now,
            audit_started_at: None,
            audit_completed_at: None,
            latest_result_id: None,
        };

        state.customers.insert(customer.id, customer.clone());
        tracing::info!("Created customer {} ({})", customer.id, customer.company_name);

        Ok(CreateOutcome {
            customer,
            created: true,
        })
    }

    async fn get(&self, id: Uuid) -> Result<Customer, AppError> {
        let state = self.state.read().await;
        state
            .customers
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Customer {} not found", id)))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: CustomerStatus,
        progress: u8,
        message: Option<&str>,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        {
            let mut state = self.state.write().await;
            let customer = state
                .customers
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!("Customer {} not found", id)))?;

            customer.status = status;
            customer.progress = progress;
            if let Some(msg) = message {
                customer.status_message = Some(msg.to_string());
            }
            customer.updated_at = now;
        }

        self.events.publish(AuditEvent::CustomerStatusChanged {
            customer_id: id,
            status,
            progress,
            message: message.map(String::from),
            timestamp: now,
        });

        Ok(())
    }

    async fn mark_audit_started(&self, id: Uuid) -> Result<(), AppError> {
        let now = Utc::now();
        {
            let mut state = self.state.write().await;
            let customer = state
                .customers
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!("Customer {} not found", id)))?;

            customer.status = CustomerStatus::Processing;
            customer.progress = 0;
            customer.status_message = Some("Audit started".to_string());
            customer.audit_started_at = Some(now);
            customer.updated_at = now;
        }

        self.events.publish(AuditEvent::CustomerStatusChanged {
            customer_id: id,
            status: CustomerStatus::Processing,
            progress: 0,
            message: Some("Audit started".to_string()),
            timestamp: now,
        });

        Ok(())
    }

    async fn list(&self, filter: &CustomerFilter) -> Result<Vec<Customer>, AppError> {
        let state = self.state.read().await;
        let mut customers: Vec<Customer> = state
            .customers
            .values()
            .filter(|c| matches_filter(c, filter))
            .cloned()
            .collect();

        customers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(customers)
    }

    async fn stale_customers(&self, cutoff: DateTime<Utc>) -> Result<Vec<Customer>, AppError> {
        let state = self.state.read().await;
        let mut stale: Vec<Customer> = state
            .customers
            .values()
            .filter(|c| {
                matches!(
                    c.status,
                    CustomerStatus::Processing | CustomerStatus::Failed
                ) && c.updated_at < cutoff
            })
            .cloned()
            .collect();

        stale.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        Ok(stale)
    }

    async fn store_result(&self, result: &AuditResult) -> Result<Uuid, AppError> {
        let result_id = Uuid::new_v4();
        let now = Utc::now();
        {
            let mut state = self.state.write().await;
            if !state.customers.contains_key(&result.customer_id) {
                return Err(AppError::NotFound(format!(
                    "Customer {} not found",
                    result.customer_id
                )));
            }

            state.results.insert(result_id, result.clone());

            let customer = state
                .customers
                .get_mut(&result.customer_id)
                .expect("checked above");
            customer.latest_result_id = Some(result_id);
            customer.status = CustomerStatus::Completed;
            customer.progress = 100;
            customer.status_message = Some("Audit complete".to_string());
            customer.audit_completed_at = Some(now);
            customer.updated_at = now;
        }

        self.events.publish(AuditEvent::CustomerStatusChanged {
            customer_id: result.customer_id,
            status: CustomerStatus::Completed,
            progress: 100,
            message: Some("Audit complete".to_string()),
            timestamp: now,
        });

        Ok(result_id)
    }

    async fn latest_result(&self, customer_id: Uuid) -> Result<Option<AuditResult>, AppError> {
        let state = self.state.read().await;
        let Some(customer) = state.customers.get(&customer_id) else {
            return Ok(None);
        };

        Ok(customer
            .latest_result_id
            .and_then(|id| state.results.get(&id))
            .cloned())
    }
}
