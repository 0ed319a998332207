//! Postgres-backed Customer Record Store.
//!
//! Uses sequential queries and a transaction for the result swap instead of
//! complex CTEs for better sqlx compatibility. Idempotent creation relies on
//! unique indexes over the lower-cased company name and email.

use crate::errors::{AppError, ResultExt};
use crate::events::{AuditEvent, EventBus};
use crate::models::{AuditResult, Customer, CustomerFilter, CustomerStatus, IntakeRequest};
use crate::store::{CreateOutcome, CustomerStore};
use crate::validation;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS customers (
    id UUID PRIMARY KEY,
    slug TEXT NOT NULL,
    company_name TEXT NOT NULL,
    contact_name TEXT,
    email TEXT NOT NULL,
    phone TEXT,
    website TEXT NOT NULL,
    industry TEXT,
    location TEXT,
    competitors TEXT[] NOT NULL DEFAULT '{}',
    target_keywords TEXT[] NOT NULL DEFAULT '{}',
    status TEXT NOT NULL,
    progress SMALLINT NOT NULL DEFAULT 0,
    status_message TEXT,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    audit_started_at TIMESTAMPTZ,
    audit_completed_at TIMESTAMPTZ,
    latest_result_id UUID
);
CREATE UNIQUE INDEX IF NOT EXISTS customers_email_key ON customers (LOWER(email));
CREATE UNIQUE INDEX IF NOT EXISTS customers_company_key ON customers (LOWER(company_name));
CREATE TABLE IF NOT EXISTS audit_results (
    id UUID PRIMARY KEY,
    customer_id UUID NOT NULL REFERENCES customers(id),
    job_id UUID NOT NULL,
    generated_at TIMESTAMPTZ NOT NULL,
    sections JSONB NOT NULL
);
CREATE INDEX IF NOT EXISTS audit_results_customer_idx ON audit_results (customer_id, generated_at DESC);
"#;

pub struct PgCustomerStore {
    pool: PgPool,
    events: EventBus,
}

impl PgCustomerStore {
    pub fn new(pool: PgPool, events: EventBus) -> Self {
        Self { pool, events }
    }

    /// Create tables and indexes if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), AppError> {
        for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Schema bootstrap statement failed")?;
        }
        tracing::info!("Customer store schema ready");
        Ok(())
    }

    fn row_to_customer(row: &PgRow) -> Result<Customer, AppError> {
        let status_raw: String = row.try_get("status")?;
        // Malformed stored statuses surface as `error` rather than failing the read
        let status = status_raw
            .parse::<CustomerStatus>()
            .unwrap_or(CustomerStatus::Error);

        let progress: i16 = row.try_get("progress")?;

        Ok(Customer {
            id: row.try_get("id")?,
            slug: row.try_get("slug")?,
            company_name: row.try_get("company_name")?,
            contact_name: row.try_get("contact_name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            website: row.try_get("website")?,
            industry: row.try_get("industry")?,
            location: row.try_get("location")?,
            competitors: row.try_get("competitors")?,
            target_keywords: row.try_get("target_keywords")?,
            status,
            progress: progress.clamp(0, 100) as u8,
            status_message: row.try_get("status_message")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            audit_started_at: row.try_get("audit_started_at")?,
            audit_completed_at: row.try_get("audit_completed_at")?,
            latest_result_id: row.try_get("latest_result_id")?,
        })
    }

    async fn find_by_identity(
        &self,
        company_name: &str,
        email: &str,
    ) -> Result<Option<Customer>, AppError> {
        let row = sqlx::query(
            "SELECT * FROM customers
             WHERE LOWER(company_name) = LOWER($1) OR LOWER(email) = LOWER($2)
             LIMIT 1",
        )
        .bind(company_name)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_customer).transpose()
    }
}

#[async_trait]
impl CustomerStore for PgCustomerStore {
    async fn create_or_get(&self, profile: IntakeRequest) -> Result<CreateOutcome, AppError> {
        validation::validate_intake(&profile)?;

        if let Some(existing) = self
            .find_by_identity(&profile.company_name, &profile.email)
            .await?
        {
            tracing::info!(
                "Intake matched existing customer {} ({})",
                existing.id,
                existing.company_name
            );
            return Ok(CreateOutcome {
                customer: existing,
                created: false,
            });
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        let slug = validation::slugify(&profile.company_name);

        let inserted = sqlx::query(
            "INSERT INTO customers (
                id, slug, company_name, contact_name, email, phone, website,
                industry, location, competitors, target_keywords,
                status, progress, status_message, created_at, updated_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
             ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(&slug)
        .bind(profile.company_name.trim())
        .bind(&profile.contact_name)
        .bind(profile.email.trim())
        .bind(&profile.phone)
        .bind(profile.website.trim())
        .bind(&profile.industry)
        .bind(&profile.location)
        .bind(&profile.competitors)
        .bind(&profile.target_keywords)
        .bind(CustomerStatus::Queued.as_str())
        .bind(0i16)
        .bind(Option::<String>::None)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        // A concurrent intake may have won the insert; the unique indexes
        // guarantee a single record either way.
        if inserted.rows_affected() == 0 {
            let existing = self
                .find_by_identity(&profile.company_name, &profile.email)
                .await?
                .ok_or_else(|| {
                    AppError::InternalError("customer vanished after conflicting insert".into())
                })?;
            return Ok(CreateOutcome {
                customer: existing,
                created: false,
            });
        }

        let customer = self.get(id).await?;
        tracing::info!("Created customer {} ({})", id, customer.company_name);
        Ok(CreateOutcome {
            customer,
            created: true,
        })
    }

    async fn get(&self, id: Uuid) -> Result<Customer, AppError> {
        let row = sqlx::query("SELECT * FROM customers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Customer {} not found", id)))?;

        Self::row_to_customer(&row)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: CustomerStatus,
        progress: u8,
        message: Option<&str>,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        let updated = sqlx::query(
            "UPDATE customers
             SET status = $2, progress = $3,
                 status_message = COALESCE($4, status_message),
                 updated_at = $5
             WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(progress as i16)
        .bind(message)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Customer {} not found", id)));
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
        let updated = sqlx::query(
            "UPDATE customers
             SET status = $2, progress = 0, status_message = $3,
                 audit_started_at = $4, updated_at = $4
             WHERE id = $1",
        )
        .bind(id)
        .bind(CustomerStatus::Processing.as_str())
        .bind("Audit started")
        .bind(now)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Customer {} not found", id)));
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
        let search = filter.q.as_ref().map(|q| format!("%{}%", q));

        let rows = sqlx::query(
            "SELECT * FROM customers
             WHERE ($1::text IS NULL OR status = $1)
               AND ($2::text IS NULL
                    OR company_name ILIKE $2
                    OR email ILIKE $2
                    OR website ILIKE $2
                    OR COALESCE(industry, '') ILIKE $2
                    OR COALESCE(location, '') ILIKE $2)
               AND ($3::timestamptz IS NULL OR created_at >= $3)
               AND ($4::timestamptz IS NULL OR created_at <= $4)
             ORDER BY created_at DESC",
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(search)
        .bind(filter.created_from)
        .bind(filter.created_to)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_customer).collect()
    }

    async fn stale_customers(&self, cutoff: DateTime<Utc>) -> Result<Vec<Customer>, AppError> {
        let rows = sqlx::query(
            "SELECT * FROM customers
             WHERE status IN ('processing', 'failed') AND updated_at < $1
             ORDER BY updated_at ASC",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_customer).collect()
    }

    async fn store_result(&self, result: &AuditResult) -> Result<Uuid, AppError> {
        let result_id = Uuid::new_v4();
        let now = Utc::now();
        let sections = serde_json::to_value(result)
            .map_err(|e| AppError::InternalError(format!("Failed to encode result: {}", e)))?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO audit_results (id, customer_id, job_id, generated_at, sections)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(result_id)
        .bind(result.customer_id)
        .bind(result.job_id)
        .bind(result.generated_at)
        .bind(&sections)
        .execute(&mut *tx)
        .await?;

        let updated = sqlx::query(
            "UPDATE customers
             SET latest_result_id = $2, status = $3, progress = 100,
                 status_message = $4, audit_completed_at = $5, updated_at = $5
             WHERE id = $1",
        )
        .bind(result.customer_id)
        .bind(result_id)
        .bind(CustomerStatus::Completed.as_str())
        .bind("Audit complete")
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(AppError::NotFound(format!(
                "Customer {} not found",
                result.customer_id
            )));
        }

        tx.commit().await?;

        self.events.publish(AuditEvent::CustomerStatusChanged {
            customer_id: result.customer_id,
            status: CustomerStatus::Completed,
            progress: 100,
            message: Some("Audit complete".to_string()),
            timestamp: now,
        });

        tracing::info!(
            "Stored audit result {} for customer {}",
            result_id,
            result.customer_id
        );
        Ok(result_id)
    }

    async fn latest_result(&self, customer_id: Uuid) -> Result<Option<AuditResult>, AppError> {
        let row = sqlx::query(
            "SELECT ar.sections
             FROM customers c
             JOIN audit_results ar ON ar.id = c.latest_result_id
             WHERE c.id = $1",
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load latest audit result")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let sections: serde_json::Value = row.try_get("sections")?;
        let result = serde_json::from_value(sections)
            .map_err(|e| AppError::InternalError(format!("Malformed stored result: {}", e)))?;

        Ok(Some(result))
    }
}
