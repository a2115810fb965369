//! Cron scheduler for the periodic reapers.

use std::sync::Arc;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing::{error, info};

use roomdrop_core::config::worker::WorkerConfig;
use roomdrop_core::error::AppError;

use crate::executor::JobExecutor;

/// Cron-based scheduler driving the job executor.
///
/// Reaper jobs are few and strictly periodic, so cron fires invoke the
/// executor directly rather than going through a durable queue.
pub struct CronScheduler {
    scheduler: JobScheduler,
    executor: Arc<JobExecutor>,
    config: WorkerConfig,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler").finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler.
    pub async fn new(executor: Arc<JobExecutor>, config: WorkerConfig) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {e}")))?;
        Ok(Self {
            scheduler,
            executor,
            config,
        })
    }

    /// Register all periodic reaper schedules from configuration.
    pub async fn register_default_tasks(&self) -> Result<(), AppError> {
        let schedule = self.config.upload_reaper_schedule.clone();
        self.register("upload_reaper", &schedule).await?;
        let schedule = self.config.room_reaper_schedule.clone();
        self.register("room_reaper", &schedule).await?;
        let schedule = self.config.version_prune_schedule.clone();
        self.register("version_retention", &schedule).await?;

        info!("All scheduled tasks registered");
        Ok(())
    }

    /// Start the scheduler.
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {e}")))?;
        info!("Cron scheduler started");
        Ok(())
    }

    /// Shut the scheduler down.
    pub async fn shutdown(&mut self) -> Result<(), AppError> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shut down scheduler: {e}")))?;
        info!("Cron scheduler shut down");
        Ok(())
    }

    /// Register one job type at the given six-field cron schedule.
    async fn register(&self, job_type: &'static str, schedule: &str) -> Result<(), AppError> {
        let executor = Arc::clone(&self.executor);
        let job = CronJob::new_async(schedule, move |_uuid, _lock| {
            let executor = Arc::clone(&executor);
            Box::pin(async move {
                match executor.execute(job_type).await {
                    Ok(summary) => {
                        if let Some(summary) = summary {
                            info!(job_type, %summary, "Job finished");
                        }
                    }
                    Err(e) => error!(job_type, error = %e, "Job failed"),
                }
            })
        })
        .map_err(|e| {
            AppError::internal(format!("Failed to create {job_type} schedule: {e}"))
        })?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add {job_type} schedule: {e}")))?;

        info!(job_type, schedule, "Registered scheduled job");
        Ok(())
    }
}
