//! Audit job processor.
//!
//! Workers claim whole jobs FIFO and drive the eight ordered stages:
//! initializing, crawling, performance, seo, competitors, keywords, social,
//! report. Stages run strictly sequentially within a job; a stage's section
//! is visible to every later stage. Only the initializing stage is fatal;
//! any other failure is recorded on the job and the section keeps its
//! fallback value. Cancellation is honoured at stage boundaries only.

use crate::artifacts::ArtifactStore;
use crate::collector::{Collected, DataCollector};
use crate::events::{AuditEvent, EventBus};
use crate::models::{
    AuditStage, Customer, CustomerStatus, JobStatus, StageFailure,
};
use crate::queue::AuditQueue;
use crate::report::ReportAssembler;
use crate::store::CustomerStore;
use crate::validation;
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub struct AuditProcessor {
    store: Arc<dyn CustomerStore>,
    queue: Arc<AuditQueue>,
    collector: Arc<DataCollector>,
    assembler: ReportAssembler,
    artifacts: Arc<dyn ArtifactStore>,
    events: EventBus,
}

fn failure_for<T>(stage: AuditStage, collected: &Collected<T>) -> Vec<StageFailure> {
    collected
        .fallback_reason
        .clone()
        .map(|message| StageFailure {
            stage,
            message,
            at: Utc::now(),
        })
        .into_iter()
        .collect()
}

impl AuditProcessor {
    pub fn new(
        store: Arc<dyn CustomerStore>,
        queue: Arc<AuditQueue>,
        collector: Arc<DataCollector>,
        assembler: ReportAssembler,
        artifacts: Arc<dyn ArtifactStore>,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            queue,
            collector,
            assembler,
            artifacts,
            events,
        }
    }

    /// Spawn `count` workers, each claiming whole jobs. The reference setup
    /// runs exactly one to avoid rate-limiting the external providers.
    pub fn spawn_workers(self: &Arc<Self>, count: usize) -> Vec<JoinHandle<()>> {
        (0..count)
            .map(|worker_id| {
                let processor = Arc::clone(self);
                tokio::spawn(async move {
                    tracing::info!("Audit worker {} started", worker_id);
                    loop {
                        let job_id = processor.queue.claim().await;
                        processor.run_job(job_id).await;
                    }
                })
            })
            .collect()
    }

    async fn publish_progress(&self, customer_id: Uuid, job_id: Uuid, message: &str) {
        let progress = self
            .queue
            .job(job_id)
            .map(|job| job.progress)
            .unwrap_or(0);

        if let Err(e) = self
            .store
            .update_status(customer_id, CustomerStatus::Processing, progress, Some(message))
            .await
        {
            tracing::warn!("Failed to update progress for {}: {}", customer_id, e);
        }
    }

    /// Check the cooperative cancellation flag at a stage boundary.
    async fn cancelled(&self, job_id: Uuid, customer_id: Uuid) -> bool {
        if !self.queue.cancel_requested(job_id) {
            return false;
        }

        let progress = self
            .queue
            .job(job_id)
            .map(|job| job.progress)
            .unwrap_or(0);
        self.queue.finish(job_id, JobStatus::Cancelled);

        if let Err(e) = self
            .store
            .update_status(
                customer_id,
                CustomerStatus::Failed,
                progress,
                Some("Audit cancelled"),
            )
            .await
        {
            tracing::warn!("Failed to mark {} cancelled: {}", customer_id, e);
        }

        tracing::info!("Job {} cancelled at stage boundary", job_id);
        true
    }

    /// Drive one claimed job through all stages.
    pub async fn run_job(&self, job_id: Uuid) {
        let Some(job) = self.queue.job(job_id) else {
            tracing::warn!("Claimed job {} no longer exists", job_id);
            return;
        };
        let customer_id = job.customer_id;

        tracing::info!("Starting audit job {} for customer {}", job_id, customer_id);

        // Stage 1: initializing - validate the customer, snapshot the domain.
        // The only fatal stage: without a customer record there is nothing to
        // audit and nowhere to record progress.
        self.queue.begin_stage(job_id, AuditStage::Initializing);
        let customer: Customer = match self.store.get(customer_id).await {
            Ok(customer) => customer,
            Err(e) => {
                tracing::error!(
                    "Fatal: customer {} missing at job start: {}",
                    customer_id,
                    e
                );
                self.queue.finish(job_id, JobStatus::Failed);
                return;
            }
        };

        let domain = match validation::domain_of(&customer.website) {
            Ok(domain) => domain,
            Err(e) => {
                tracing::error!("Fatal: customer {} website invalid: {}", customer_id, e);
                self.queue.finish(job_id, JobStatus::Failed);
                let _ = self
                    .store
                    .update_status(
                        customer_id,
                        CustomerStatus::Failed,
                        0,
                        Some(&format!("Audit aborted: {}", e)),
                    )
                    .await;
                return;
            }
        };

        if let Err(e) = self.store.mark_audit_started(customer_id).await {
            tracing::error!("Fatal: could not start audit for {}: {}", customer_id, e);
            self.queue.finish(job_id, JobStatus::Failed);
            return;
        }

        self.queue
            .record_stage(job_id, AuditStage::Initializing, Vec::new());
        self.publish_progress(customer_id, job_id, "Initialization complete")
            .await;

        // Every section starts at its fallback value; live stages overwrite
        // their own section, so a skipped stage needs no special handling.
        let mut result = self
            .collector
            .synthetic()
            .baseline_result(&customer, job_id, &domain);

        // Stage 2: crawling - discover a representative page set.
        if self.cancelled(job_id, customer_id).await {
            return;
        }
        self.queue.begin_stage(job_id, AuditStage::Crawling);
        let collected = self.collector.collect_crawl(&domain).await;
        let failures = failure_for(AuditStage::Crawling, &collected);
        result.stage_failures.extend(failures.clone());
        result.crawl = collected.data;
        self.queue
            .record_stage(job_id, AuditStage::Crawling, failures);
        self.publish_progress(customer_id, job_id, "Site crawl complete")
            .await;

        // Stage 3: performance.
        if self.cancelled(job_id, customer_id).await {
            return;
        }
        self.queue.begin_stage(job_id, AuditStage::Performance);
        let collected = self.collector.collect_performance(&domain).await;
        let failures = failure_for(AuditStage::Performance, &collected);
        result.stage_failures.extend(failures.clone());
        result.performance = collected.data;
        self.queue
            .record_stage(job_id, AuditStage::Performance, failures);
        self.publish_progress(customer_id, job_id, "Performance analysis complete")
            .await;

        // Stage 4: seo - technical checks plus the backlink profile.
        if self.cancelled(job_id, customer_id).await {
            return;
        }
        self.queue.begin_stage(job_id, AuditStage::Seo);
        let collected = self.collector.collect_technical_seo(&domain).await;
        let mut failures = failure_for(AuditStage::Seo, &collected);
        result.technical_seo = collected.data;

        let collected = self.collector.collect_backlinks(&domain).await;
        failures.extend(failure_for(AuditStage::Seo, &collected));
        result.backlinks = collected.data;

        result.stage_failures.extend(failures.clone());
        self.queue.record_stage(job_id, AuditStage::Seo, failures);
        self.publish_progress(customer_id, job_id, "SEO analysis complete")
            .await;

        // Stage 5: competitors - one lookup per configured competitor URL.
        if self.cancelled(job_id, customer_id).await {
            return;
        }
        self.queue.begin_stage(job_id, AuditStage::Competitors);
        let mut competitor_sections = Vec::with_capacity(customer.competitors.len());
        let mut failures = Vec::new();
        for competitor_url in &customer.competitors {
            let competitor_domain = match validation::domain_of(competitor_url) {
                Ok(domain) => domain,
                Err(e) => {
                    failures.push(StageFailure {
                        stage: AuditStage::Competitors,
                        message: format!("Skipping competitor '{}': {}", competitor_url, e),
                        at: Utc::now(),
                    });
                    continue;
                }
            };

            let collected = self.collector.collect_competitors(&competitor_domain).await;
            failures.extend(failure_for(AuditStage::Competitors, &collected));
            competitor_sections.push(collected.data);
        }
        result.stage_failures.extend(failures.clone());
        result.competitors = competitor_sections;
        self.queue
            .record_stage(job_id, AuditStage::Competitors, failures);
        self.publish_progress(customer_id, job_id, "Competitor analysis complete")
            .await;

        // Stage 6: keywords.
        if self.cancelled(job_id, customer_id).await {
            return;
        }
        self.queue.begin_stage(job_id, AuditStage::Keywords);
        let collected = self
            .collector
            .collect_keywords(&domain, &customer.target_keywords)
            .await;
        let failures = failure_for(AuditStage::Keywords, &collected);
        result.stage_failures.extend(failures.clone());
        result.keywords = collected.data;
        self.queue
            .record_stage(job_id, AuditStage::Keywords, failures);
        self.publish_progress(customer_id, job_id, "Keyword research complete")
            .await;

        // Stage 7: social.
        if self.cancelled(job_id, customer_id).await {
            return;
        }
        self.queue.begin_stage(job_id, AuditStage::Social);
        let collected = self
            .collector
            .collect_social(&customer.company_name, &customer.website)
            .await;
        let failures = failure_for(AuditStage::Social, &collected);
        result.stage_failures.extend(failures.clone());
        result.social_media = collected.data;
        self.queue
            .record_stage(job_id, AuditStage::Social, failures);
        self.publish_progress(customer_id, job_id, "Social media scan complete")
            .await;

        // Stage 8: report - assemble, store the artifact, swap in the result.
        if self.cancelled(job_id, customer_id).await {
            return;
        }
        self.queue.begin_stage(job_id, AuditStage::Report);
        let mut failures = Vec::new();

        result.generated_at = Utc::now();
        let artifact = self.assembler.assemble(&customer, &result);

        let report_url = match self.artifacts.store(&artifact, &customer.slug).await {
            Ok(url) => url,
            Err(e) => {
                failures.push(StageFailure {
                    stage: AuditStage::Report,
                    message: format!("Artifact store failed: {}", e),
                    at: Utc::now(),
                });
                String::new()
            }
        };

        match self.store.store_result(&result).await {
            Ok(result_id) => {
                tracing::info!(
                    "Audit {} complete for customer {} (result {})",
                    job_id,
                    customer_id,
                    result_id
                );
            }
            Err(e) => {
                // The customer stays in processing; the staleness sweep will
                // retry the audit later.
                tracing::error!("Failed to store result for {}: {}", customer_id, e);
                failures.push(StageFailure {
                    stage: AuditStage::Report,
                    message: format!("Result store failed: {}", e),
                    at: Utc::now(),
                });
            }
        }

        self.queue
            .record_stage(job_id, AuditStage::Report, failures);
        self.queue.finish(job_id, JobStatus::Completed);

        self.events.publish(AuditEvent::AuditCompleted {
            customer_id,
            job_id,
            report_url,
            timestamp: Utc::now(),
        });
    }
}
