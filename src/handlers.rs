use crate::config::Config;
use crate::errors::AppError;
use crate::models::*;
use crate::orchestrator::{report_url_for, Orchestrator};
use crate::queue::{AuditQueue, CancelOutcome};
use crate::report::ReportAssembler;
use crate::report_cache::CachedReport;
use crate::store::CustomerStore;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use moka::future::Cache;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Customer record store (single source of truth for status).
    pub store: Arc<dyn CustomerStore>,
    /// Audit job queue.
    pub queue: Arc<AuditQueue>,
    /// Workflow orchestrator handling the external triggers.
    pub orchestrator: Arc<Orchestrator>,
    /// Report assembler (pure renderer).
    pub assembler: ReportAssembler,
    /// Rendered-report cache keyed by result id; entries are checksummed.
    pub report_cache: Cache<Uuid, String>,
    /// Intake deduplication cache: lower-cased email -> customer id.
    /// Short-circuits rapid duplicate submissions before touching the store.
    pub recent_intake_cache: Cache<String, Uuid>,
}

/// Health check endpoint.
///
/// Returns the service status, version, and health information.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with health status JSON.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "site-audit-api",
            "version": "0.1.0"
        })),
    )
}

/// POST /api/v1/audits
///
/// Intake endpoint: validates the request, creates (or returns) the customer
/// and queues an audit. Responds 202 for a freshly handled intake, 200 when
/// the deduplication cache short-circuits a rapid duplicate.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `request` - The intake payload.
///
/// # Returns
///
/// * `Result<(StatusCode, Json<IntakeResponse>), AppError>` - The intake response or an error.
pub async fn intake(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IntakeRequest>,
) -> Result<(StatusCode, Json<IntakeResponse>), AppError> {
    tracing::info!("POST /audits - company: {:?}", request.company_name);

    let email_key = request.email.trim().to_lowercase();
    if !email_key.is_empty() {
        if let Some(customer_id) = state.recent_intake_cache.get(&email_key).await {
            if let Ok(customer) = state.store.get(customer_id).await {
                tracing::debug!("Intake dedup cache hit for {}", email_key);
                return Ok((
                    StatusCode::OK,
                    Json(IntakeResponse {
                        customer_id: customer.id,
                        status: customer.status,
                        report_url_when_ready: report_url_for(customer.id),
                    }),
                ));
            }
        }
    }

    let response = state.orchestrator.intake(request).await?;
    state
        .recent_intake_cache
        .insert(email_key, response.customer_id)
        .await;

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// GET /api/v1/customers
///
/// Lists customers, filterable by status, free-text search and created-at
/// date range.
pub async fn list_customers(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<CustomerFilter>,
) -> Result<Json<Vec<Customer>>, AppError> {
    tracing::debug!("GET /customers - filter: {:?}", filter);
    let customers = state.store.list(&filter).await?;
    Ok(Json(customers))
}

/// GET /api/v1/customers/:id
pub async fn get_customer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Customer>, AppError> {
    tracing::debug!("GET /customers/{}", id);
    let customer = state.store.get(id).await?;
    Ok(Json(customer))
}

/// POST /api/v1/customers/:id/audit
///
/// Manual re-trigger. Idempotent: a second request while an audit is active
/// returns the existing job id.
pub async fn trigger_audit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("POST /customers/{}/audit", id);

    let outcome = state.orchestrator.retrigger(id).await?;
    Ok(Json(json!({
        "job_id": outcome.job_id(),
        "created": matches!(outcome, crate::queue::EnqueueOutcome::Created(_)),
    })))
}

/// POST /api/v1/customers/:id/refresh
///
/// Cross-process change notification: re-reads the customer from the record
/// store rather than trusting any cached state.
pub async fn refresh_customer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Customer>, AppError> {
    let customer = state.orchestrator.customer_changed(id).await?;
    Ok(Json(customer))
}

/// GET /api/v1/audits/process
///
/// Manual sweep trigger, the safety net behind the event-driven path.
pub async fn trigger_sweep(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("GET /audits/process - manual sweep");
    let requeued = state.orchestrator.sweep_once().await?;
    Ok(Json(json!({ "requeued": requeued })))
}

/// GET /api/v1/customers/:id/report
///
/// The rendered HTML report for the customer's latest completed audit.
/// Rendered output is cached per result id with a checksum; invalid cache
/// entries are discarded and re-rendered.
pub async fn get_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    tracing::debug!("GET /customers/{}/report", id);

    let customer = state.store.get(id).await?;
    let Some(result_id) = customer.latest_result_id else {
        return Err(AppError::NotFound(format!(
            "No completed audit for customer {} yet",
            id
        )));
    };

    // Check cache first with validation
    if let Some(cached) = state.report_cache.get(&result_id).await {
        if let Some(html) = CachedReport::deserialize_and_validate(&cached) {
            tracing::debug!("Report cache HIT (validated) for {}", result_id);
            return Ok((
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                html,
            ));
        }
        tracing::warn!("Report cache entry invalid for {}, re-rendering", result_id);
    }

    let result = state
        .store
        .latest_result(customer.id)
        .await?
        .ok_or_else(|| {
            AppError::InternalError(format!("Result {} missing for customer {}", result_id, id))
        })?;

    let artifact = state.assembler.assemble(&customer, &result);
    let entry = CachedReport::new(artifact.html.clone());
    state.report_cache.insert(result_id, entry.serialize()).await;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        artifact.html,
    ))
}

/// GET /api/v1/customers/:id/exports/:table
///
/// CSV export tables with fixed headers:
/// `technical-issues`, `keyword-opportunities`, `competitor-comparison`.
pub async fn export_csv(
    State(state): State<Arc<AppState>>,
    Path((id, table)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, AppError> {
    tracing::debug!("GET /customers/{}/exports/{}", id, table);

    let customer = state.store.get(id).await?;
    let result = state
        .store
        .latest_result(customer.id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("No completed audit for customer {} yet", id))
        })?;

    let artifact = state.assembler.assemble(&customer, &result);
    let csv = match table.as_str() {
        "technical-issues" => artifact.technical_issues_csv,
        "keyword-opportunities" => artifact.keyword_opportunities_csv,
        "competitor-comparison" => artifact.competitor_comparison_csv,
        other => {
            return Err(AppError::Validation(format!(
                "Unknown export table '{}'",
                other
            )))
        }
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}-{}.csv\"", customer.slug, table),
            ),
        ],
        csv,
    ))
}

/// GET /api/v1/jobs/:id
///
/// Status, progress and the stage-error list of one audit job. Terminal jobs
/// stay queryable until process restart.
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AuditJob>, AppError> {
    let job = state
        .queue
        .job(id)
        .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;
    Ok(Json(job))
}

/// DELETE /api/v1/jobs/:id
///
/// Cooperative cancellation: queued jobs are removed outright, processing
/// jobs stop at the next stage boundary leaving the customer `failed`.
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("DELETE /jobs/{}", id);

    let outcome = state
        .queue
        .cancel(id)
        .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;

    let outcome_str = match outcome {
        CancelOutcome::RemovedFromQueue => "removed_from_queue",
        CancelOutcome::WillStopAtStageBoundary => "will_stop_at_stage_boundary",
        CancelOutcome::AlreadyFinished => "already_finished",
    };

    Ok(Json(json!({ "job_id": id, "outcome": outcome_str })))
}
