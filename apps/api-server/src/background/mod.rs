//! Background work - periodic sweep of the in-process counter store.

use std::sync::Arc;

#[cfg(feature = "scheduler")]
use tokio_cron_scheduler::{Job, JobScheduler};

use herbarium_infra::InMemoryCounterStore;

use crate::middleware::rate_limit::now_ms;

/// Sweep period used when the cron scheduler is compiled out.
#[cfg(not(feature = "scheduler"))]
const SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// Drop local counters whose windows have both elapsed.
pub async fn sweep_once(local: &InMemoryCounterStore) -> usize {
    let removed = local.sweep_expired(now_ms()).await;
    if removed > 0 {
        tracing::debug!(removed, "Swept expired rate-limit counters");
    }
    removed
}

/// Handle to the running sweep job.
pub struct Sweeper {
    #[cfg(feature = "scheduler")]
    scheduler: JobScheduler,
    #[cfg(not(feature = "scheduler"))]
    task: tokio::task::JoinHandle<()>,
}

impl Sweeper {
    /// Start sweeping `local` on the `cron` schedule.
    #[cfg(feature = "scheduler")]
    pub async fn start(local: Arc<InMemoryCounterStore>, cron: &str) -> anyhow::Result<Self> {
        let job = Job::new_async(cron, move |_uuid, _lock| {
            let local = local.clone();
            Box::pin(async move {
                sweep_once(&local).await;
            })
        })?;

        let scheduler = JobScheduler::new().await?;
        let job_id = scheduler.add(job).await?;
        scheduler.start().await?;
        tracing::info!(schedule = %cron, job_id = %job_id, "Counter sweep scheduled");

        Ok(Self { scheduler })
    }

    /// Start sweeping `local` on a fixed interval; `cron` is ignored.
    #[cfg(not(feature = "scheduler"))]
    pub async fn start(local: Arc<InMemoryCounterStore>, cron: &str) -> anyhow::Result<Self> {
        tracing::info!(
            ignored_schedule = %cron,
            interval_secs = SWEEP_INTERVAL.as_secs(),
            "Scheduler feature disabled, sweeping on a fixed interval"
        );

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                sweep_once(&local).await;
            }
        });

        Ok(Self { task })
    }

    pub async fn shutdown(self) {
        #[cfg(feature = "scheduler")]
        {
            let mut scheduler = self.scheduler;
            match scheduler.shutdown().await {
                Ok(()) => tracing::info!("Counter sweep stopped"),
                Err(e) => tracing::warn!(error = %e, "Failed to stop sweep scheduler"),
            }
        }

        #[cfg(not(feature = "scheduler"))]
        self.task.abort();
    }
}
