use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::db::snapshot_store::SnapshotStore;
use crate::errors::AppError;
use crate::external::market_data::{CandleSource, QuoteSource};
use crate::jobs::snapshot_job;
use crate::services::market_cache::{CandleCache, QuoteCache};

const DEFAULT_SNAPSHOT_CRON: &str = "0 0 2 * * *";

// Context passed to job functions
#[derive(Clone)]
pub struct JobContext {
    pub pool: PgPool,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub candles: Arc<dyn CandleSource>,
    pub quotes: Arc<dyn QuoteSource>,
    pub candle_cache: Arc<CandleCache>,
    pub quote_cache: Arc<QuoteCache>,
}

#[derive(Debug)]
pub struct JobResult {
    pub items_processed: i32,
    pub items_failed: i32,
}

pub struct JobSchedulerService {
    scheduler: JobScheduler,
    context: JobContext,
}

impl JobSchedulerService {
    pub async fn new(context: JobContext) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self { scheduler, context })
    }

    /// Start all scheduled jobs
    pub async fn start(&mut self) -> Result<(), AppError> {
        info!("🚀 Starting job scheduler...");

        let snapshot_cron = std::env::var("SNAPSHOT_CRON")
            .unwrap_or_else(|_| DEFAULT_SNAPSHOT_CRON.to_string());

        self.schedule_job(
            &snapshot_cron,
            "capture_portfolio_snapshots",
            snapshot_job::capture_all_snapshots,
        )
        .await?;

        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to start scheduler: {}", e)))?;

        info!("✅ Job scheduler started");
        Ok(())
    }

    /// Stop the scheduler gracefully
    #[allow(dead_code)]
    pub async fn stop(&mut self) -> Result<(), AppError> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to stop scheduler: {}", e)))?;
        info!("🛑 Job scheduler stopped");
        Ok(())
    }

    async fn schedule_job<F, Fut>(
        &mut self,
        schedule: &str,
        job_name: &'static str,
        job_fn: F,
    ) -> Result<(), AppError>
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<JobResult, AppError>> + Send + 'static,
    {
        let context = self.context.clone();
        let job_fn = Arc::new(job_fn);

        let job = Job::new_async(schedule, move |_uuid, _l| {
            let context = context.clone();
            let job_fn = job_fn.clone();
            Box::pin(async move {
                run_job(job_name, context, job_fn).await;
            })
        })
        .map_err(|e| AppError::Internal(format!("Failed to create job {}: {}", job_name, e)))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to add job {}: {}", job_name, e)))?;

        info!("📅 Scheduled: {} [cron: {}]", job_name, schedule);
        Ok(())
    }
}

async fn run_job<F, Fut>(job_name: &str, context: JobContext, job_fn: Arc<F>)
where
    F: Fn(JobContext) -> Fut,
    Fut: std::future::Future<Output = Result<JobResult, AppError>>,
{
    info!("🏃 Starting job: {}", job_name);
    let started_at = Utc::now();

    let result = job_fn(context).await;
    let duration_ms = (Utc::now() - started_at).num_milliseconds();

    match result {
        Ok(job_result) => {
            info!(
                "✅ Job completed: {} (processed: {}, failed: {}, duration: {}ms)",
                job_name, job_result.items_processed, job_result.items_failed, duration_ms
            );
        }
        Err(e) => {
            error!("❌ Job failed: {} - {} ({}ms)", job_name, e, duration_ms);
        }
    }
}
