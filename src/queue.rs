//! Audit job queue.
//!
//! A strict FIFO queue of audit jobs with the two load-bearing invariants of
//! the pipeline: at most one active (queued or processing) job per customer,
//! and whole jobs claimed by workers, so a job's stages never split across
//! workers. Cancellation is cooperative and honoured at stage boundaries.

use crate::models::{AuditJob, AuditStage, JobStatus, StageFailure, cumulative_progress};
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::Notify;
use uuid::Uuid;

/// Outcome of an enqueue request. A duplicate enqueue for a customer with an
/// active job is not an error; it resolves to the existing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Created(Uuid),
    AlreadyActive(Uuid),
}

impl EnqueueOutcome {
    pub fn job_id(&self) -> Uuid {
        match self {
            EnqueueOutcome::Created(id) | EnqueueOutcome::AlreadyActive(id) => *id,
        }
    }
}

/// Outcome of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The job was still queued; it is gone with no side effects.
    RemovedFromQueue,
    /// The job is processing; it will stop at the next stage boundary.
    WillStopAtStageBoundary,
    /// The job had already reached a terminal status.
    AlreadyFinished,
}

#[derive(Default)]
struct QueueInner {
    pending: VecDeque<Uuid>,
    jobs: HashMap<Uuid, AuditJob>,
    active_by_customer: HashMap<Uuid, Uuid>,
}

pub struct AuditQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
}

impl AuditQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            notify: Notify::new(),
        }
    }

    /// Enqueue an audit for a customer. Idempotent: if the customer already
    /// has an active job, that job's id is returned and nothing is created.
    pub fn enqueue(&self, customer_id: Uuid) -> EnqueueOutcome {
        let mut inner = self.inner.lock().expect("queue lock poisoned");

        if let Some(existing) = inner.active_by_customer.get(&customer_id) {
            tracing::debug!(
                "Customer {} already has active job {}",
                customer_id,
                existing
            );
            return EnqueueOutcome::AlreadyActive(*existing);
        }

        let job = AuditJob {
            id: Uuid::new_v4(),
            customer_id,
            status: JobStatus::Queued,
            current_stage: None,
            stages_attempted: Vec::new(),
            progress: 0,
            errors: Vec::new(),
            cancel_requested: false,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        };

        let job_id = job.id;
        inner.pending.push_back(job_id);
        inner.jobs.insert(job_id, job);
        inner.active_by_customer.insert(customer_id, job_id);
        drop(inner);

        tracing::info!("Enqueued audit job {} for customer {}", job_id, customer_id);
        self.notify.notify_one();
        EnqueueOutcome::Created(job_id)
    }

    /// Wait for the next queued job and claim it, FIFO.
    pub async fn claim(&self) -> Uuid {
        loop {
            if let Some(job_id) = self.try_claim() {
                return job_id;
            }
            self.notify.notified().await;
        }
    }

    fn try_claim(&self) -> Option<Uuid> {
        let mut inner = self.inner.lock().expect("queue lock poisoned");

        let job_id = inner.pending.pop_front()?;
        if let Some(job) = inner.jobs.get_mut(&job_id) {
            job.status = JobStatus::Processing;
            job.started_at = Some(Utc::now());
        }

        // Wake another worker if jobs remain; notify_one stores at most one
        // permit, so a burst of enqueues can outnumber stored wakeups.
        if !inner.pending.is_empty() {
            self.notify.notify_one();
        }

        Some(job_id)
    }

    /// Snapshot of a job, active or terminal.
    pub fn job(&self, job_id: Uuid) -> Option<AuditJob> {
        let inner = self.inner.lock().expect("queue lock poisoned");
        inner.jobs.get(&job_id).cloned()
    }

    /// The active job for a customer, if any.
    pub fn active_job_for(&self, customer_id: Uuid) -> Option<Uuid> {
        let inner = self.inner.lock().expect("queue lock poisoned");
        inner.active_by_customer.get(&customer_id).copied()
    }

    /// Request cancellation. Queued jobs are removed outright; processing
    /// jobs stop at the next stage boundary.
    pub fn cancel(&self, job_id: Uuid) -> Option<CancelOutcome> {
        let mut inner = self.inner.lock().expect("queue lock poisoned");

        let job = inner.jobs.get_mut(&job_id)?;
        match job.status {
            JobStatus::Queued => {
                job.status = JobStatus::Cancelled;
                job.finished_at = Some(Utc::now());
                let customer_id = job.customer_id;
                inner.pending.retain(|id| *id != job_id);
                inner.active_by_customer.remove(&customer_id);
                tracing::info!("Removed queued job {} before processing", job_id);
                Some(CancelOutcome::RemovedFromQueue)
            }
            JobStatus::Processing => {
                job.cancel_requested = true;
                tracing::info!("Cancellation requested for processing job {}", job_id);
                Some(CancelOutcome::WillStopAtStageBoundary)
            }
            _ => Some(CancelOutcome::AlreadyFinished),
        }
    }

    /// True when cancellation was requested for a processing job.
    pub fn cancel_requested(&self, job_id: Uuid) -> bool {
        let inner = self.inner.lock().expect("queue lock poisoned");
        inner
            .jobs
            .get(&job_id)
            .map(|j| j.cancel_requested)
            .unwrap_or(false)
    }

    /// Record that a stage was attempted; progress is the cumulative weight
    /// of attempted stages, so it is non-decreasing by construction.
    pub fn record_stage(&self, job_id: Uuid, stage: AuditStage, failures: Vec<StageFailure>) {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        if let Some(job) = inner.jobs.get_mut(&job_id) {
            job.stages_attempted.push(stage);
            job.progress = cumulative_progress(&job.stages_attempted);
            job.current_stage = None;
            job.errors.extend(failures);
        }
    }

    /// Mark the stage a worker is about to run.
    pub fn begin_stage(&self, job_id: Uuid, stage: AuditStage) {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        if let Some(job) = inner.jobs.get_mut(&job_id) {
            job.current_stage = Some(stage);
        }
    }

    /// Move a job to a terminal status and drop it from the active set. The
    /// terminal snapshot stays queryable until process restart.
    pub fn finish(&self, job_id: Uuid, status: JobStatus) {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        let Some(job) = inner.jobs.get_mut(&job_id) else {
            return;
        };

        job.status = status;
        job.current_stage = None;
        job.finished_at = Some(Utc::now());
        let customer_id = job.customer_id;
        inner.active_by_customer.remove(&customer_id);
        tracing::info!("Job {} finished with status {}", job_id, status.as_str());
    }

    /// Number of jobs waiting to be claimed.
    pub fn pending_len(&self) -> usize {
        let inner = self.inner.lock().expect("queue lock poisoned");
        inner.pending.len()
    }
}

impl Default for AuditQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_is_idempotent_per_customer() {
        let queue = AuditQueue::new();
        let customer = Uuid::new_v4();

        let first = queue.enqueue(customer);
        let second = queue.enqueue(customer);

        assert!(matches!(first, EnqueueOutcome::Created(_)));
        assert_eq!(second, EnqueueOutcome::AlreadyActive(first.job_id()));
        assert_eq!(queue.pending_len(), 1);
    }

    #[test]
    fn claim_is_fifo() {
        let queue = AuditQueue::new();
        let a = queue.enqueue(Uuid::new_v4()).job_id();
        let b = queue.enqueue(Uuid::new_v4()).job_id();

        assert_eq!(queue.try_claim(), Some(a));
        assert_eq!(queue.try_claim(), Some(b));
        assert_eq!(queue.try_claim(), None);
    }

    #[test]
    fn cancelling_queued_job_removes_it() {
        let queue = AuditQueue::new();
        let customer = Uuid::new_v4();
        let job_id = queue.enqueue(customer).job_id();

        assert_eq!(queue.cancel(job_id), Some(CancelOutcome::RemovedFromQueue));
        assert_eq!(queue.try_claim(), None);
        // The customer can be enqueued again afterwards
        assert!(matches!(queue.enqueue(customer), EnqueueOutcome::Created(_)));
    }

    #[test]
    fn finish_frees_the_customer_slot() {
        let queue = AuditQueue::new();
        let customer = Uuid::new_v4();
        let job_id = queue.enqueue(customer).job_id();

        queue.try_claim();
        queue.finish(job_id, JobStatus::Completed);

        assert!(queue.active_job_for(customer).is_none());
        assert!(matches!(queue.enqueue(customer), EnqueueOutcome::Created(_)));
    }

    #[test]
    fn progress_accumulates_stage_weights() {
        let queue = AuditQueue::new();
        let job_id = queue.enqueue(Uuid::new_v4()).job_id();
        queue.try_claim();

        let mut last = 0;
        for stage in AuditStage::ALL {
            queue.record_stage(job_id, stage, Vec::new());
            let progress = queue.job(job_id).unwrap().progress;
            assert!(progress >= last);
            last = progress;
        }
        assert_eq!(last, 100);
    }
}
