//! Background settlement worker

use std::sync::Arc;
use std::time::Duration;

use crate::config::SettlementWorkerConfig;
use crate::error::LedgerError;

use super::engine::{SettleTaskResult, SettlementEngine};
use super::queue::{JobState, SettlementJob, SettlementQueue};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
    pub stale_threshold: Duration,
    pub batch_size: i64,
    pub max_retries: i32,
}

impl From<&SettlementWorkerConfig> for WorkerConfig {
    fn from(c: &SettlementWorkerConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(c.poll_interval_secs),
            stale_threshold: Duration::from_secs(c.stale_threshold_secs),
            batch_size: c.batch_size as i64,
            max_retries: c.max_retries,
        }
    }
}

/// Polls the job queue and drives task settlement.
///
/// Multiple instances can run against the same database; SKIP LOCKED claiming
/// keeps them from stepping on each other.
pub struct SettlementWorker {
    queue: SettlementQueue,
    engine: Arc<SettlementEngine>,
    config: WorkerConfig,
}

impl SettlementWorker {
    pub fn new(queue: SettlementQueue, engine: Arc<SettlementEngine>, config: WorkerConfig) -> Self {
        Self {
            queue,
            engine,
            config,
        }
    }

    /// Poll until `shutdown` resolves. Errors inside a cycle are logged and
    /// retried on the next tick, never fatal to the loop.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        tracing::info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            batch_size = self.config.batch_size,
            "Settlement worker started"
        );

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Settlement worker shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::error!(error = %e, "Settlement cycle failed");
                    }
                }
            }
        }
    }

    /// One poll cycle: rescue stale jobs, then claim and execute a batch.
    /// Returns the number of jobs that settled successfully.
    pub async fn run_once(&self) -> Result<usize, LedgerError> {
        let rescued = self
            .queue
            .rescue_stale(self.config.stale_threshold.as_secs() as i64)
            .await?;
        if rescued > 0 {
            tracing::warn!(rescued, "Requeued stale settlement jobs");
        }

        let jobs = self.queue.claim_batch(self.config.batch_size).await?;
        if jobs.is_empty() {
            return Ok(0);
        }

        let mut settled = 0;
        for job in jobs {
            if self.execute(&job).await {
                settled += 1;
            }
        }
        Ok(settled)
    }

    async fn execute(&self, job: &SettlementJob) -> bool {
        match self.engine.settle_task(job.task_id, job.auditor_id).await {
            Ok(result) => {
                if matches!(result, SettleTaskResult::AlreadySettled) {
                    tracing::info!(
                        job_id = %job.id,
                        task_id = %job.task_id,
                        "Job for already-settled task, marking done"
                    );
                }
                if let Err(e) = self.queue.mark_done(job.id).await {
                    // Settlement committed; the stale-rescue path will retry
                    // the job and hit the idempotency guard.
                    tracing::error!(job_id = %job.id, error = %e, "Failed to mark job done");
                }
                true
            }
            Err(e) => {
                tracing::error!(
                    job_id = %job.id,
                    task_id = %job.task_id,
                    retries = job.retries,
                    error = %e,
                    "Task settlement failed"
                );
                match self
                    .queue
                    .record_failure(job.id, &e.to_string(), self.config.max_retries)
                    .await
                {
                    Ok(JobState::Failed) => {
                        tracing::error!(
                            job_id = %job.id,
                            task_id = %job.task_id,
                            "Job exhausted retries, parked as failed"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(job_id = %job.id, error = %e, "Failed to record job failure");
                    }
                }
                false
            }
        }
    }
}
