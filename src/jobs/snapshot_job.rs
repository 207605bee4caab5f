//! Daily portfolio snapshot job.
//!
//! Captures one aggregate valuation snapshot per portfolio for today's UTC
//! date. Portfolios already snapshotted today are skipped (the history
//! store's uniqueness constraint backs this up), and a failure on one
//! portfolio never aborts the rest of the batch.

use chrono::Utc;
use tracing::{error, info};

use crate::db;
use crate::errors::AppError;
use crate::services::history_service;
use crate::services::job_scheduler_service::{JobContext, JobResult};

pub async fn capture_all_snapshots(ctx: JobContext) -> Result<JobResult, AppError> {
    let today = Utc::now().date_naive();
    info!("📸 Capturing portfolio snapshots for {}", today);

    let portfolio_ids = db::portfolio_queries::fetch_all_ids(&ctx.pool).await?;
    if portfolio_ids.is_empty() {
        info!("No portfolios found, nothing to snapshot");
        return Ok(JobResult {
            items_processed: 0,
            items_failed: 0,
        });
    }

    let mut processed = 0;
    let mut failed = 0;

    for portfolio_id in portfolio_ids {
        let outcome = async {
            let holdings =
                db::holding_queries::fetch_for_portfolio(&ctx.pool, portfolio_id).await?;
            history_service::capture_snapshot(
                ctx.snapshots.as_ref(),
                &ctx.quote_cache,
                ctx.quotes.as_ref(),
                portfolio_id,
                &holdings,
                today,
            )
            .await
        }
        .await;

        match outcome {
            Ok(true) => {
                info!("✅ Captured snapshot for portfolio {}", portfolio_id);
                processed += 1;
            }
            Ok(false) => {
                info!("Snapshot already present for portfolio {}, skipped", portfolio_id);
                processed += 1;
            }
            Err(e) => {
                error!("❌ Failed to snapshot portfolio {}: {}", portfolio_id, e);
                failed += 1;
            }
        }
    }

    info!(
        "✅ Snapshot job completed: {} portfolios processed, {} failed",
        processed, failed
    );

    Ok(JobResult {
        items_processed: processed,
        items_failed: failed,
    })
}
