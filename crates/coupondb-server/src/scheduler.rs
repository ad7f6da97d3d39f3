//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and, when
//! `COUPONDB_SWEEP_CRON` is set, registers the recurring full sweep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use coupondb_core::AppConfig;
use coupondb_db::ScrapeRunCounts;
use coupondb_scraper::{Orchestrator, RunSummary};
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// the sweep job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    config: Arc<AppConfig>,
    orchestrator: Option<Arc<Orchestrator>>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    match (config.sweep_cron.as_deref(), orchestrator) {
        (Some(cron), Some(orchestrator)) => {
            register_sweep_job(&scheduler, cron, pool, orchestrator).await?;
        }
        _ => tracing::info!("scheduler: COUPONDB_SWEEP_CRON not set; no sweep scheduled"),
    }

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the recurring full sweep. A tick that fires while the previous
/// sweep is still running is skipped.
async fn register_sweep_job(
    scheduler: &JobScheduler,
    cron: &str,
    pool: PgPool,
    orchestrator: Arc<Orchestrator>,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);
    let running = Arc::new(AtomicBool::new(false));

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let orchestrator = Arc::clone(&orchestrator);
        let running = Arc::clone(&running);

        Box::pin(async move {
            if running
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                tracing::warn!("scheduler: previous sweep still running; skipping tick");
                return;
            }
            tracing::info!("scheduler: starting sweep");
            run_sweep_job(&pool, &orchestrator).await;
            tracing::info!("scheduler: sweep complete");
            running.store(false, Ordering::Release);
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: registered sweep job");
    Ok(())
}

/// Run one sweep over the configured categories, recording a scrape run.
/// Failures are logged, never propagated.
async fn run_sweep_job(pool: &PgPool, orchestrator: &Orchestrator) {
    let run = match coupondb_db::create_scrape_run(pool, "sweep", "scheduler").await {
        Ok(run) => run,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to create scrape run");
            return;
        }
    };
    if let Err(e) = coupondb_db::start_scrape_run(pool, run.id).await {
        tracing::error!(run_id = run.id, error = %e, "scheduler: failed to start scrape run");
        return;
    }

    let categories = orchestrator.config().categories.clone();
    let summary = orchestrator.sweep(&categories).await;
    let counts = run_counts(&summary);

    let outcome = match summary.into_result() {
        Ok(_) => coupondb_db::complete_scrape_run(pool, run.id, counts).await,
        Err(e) => {
            tracing::error!(run_id = run.id, error = %e, "scheduler: sweep failed");
            coupondb_db::fail_scrape_run(pool, run.id, counts, &e.to_string()).await
        }
    };
    if let Err(e) = outcome {
        tracing::error!(run_id = run.id, error = %e, "scheduler: failed to finish scrape run");
    }
}

fn run_counts(summary: &RunSummary) -> ScrapeRunCounts {
    ScrapeRunCounts {
        domains_succeeded: i32::try_from(summary.succeeded()).unwrap_or(i32::MAX),
        domains_failed: i32::try_from(summary.failed()).unwrap_or(i32::MAX),
        coupons_persisted: i64::try_from(summary.coupons()).unwrap_or(i64::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coupondb_core::{Category, Environment, ScrapeConfig};
    use coupondb_scraper::CategorySummary;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    fn config(sweep_cron: Option<&str>) -> AppConfig {
        AppConfig {
            database_url: None,
            env: Environment::Test,
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
            log_level: "info".to_string(),
            db_max_connections: 1,
            db_min_connections: 0,
            db_acquire_timeout_secs: 1,
            scrape: ScrapeConfig::default(),
            scrape_now_enabled: false,
            sweep_cron: sweep_cron.map(str::to_string),
        }
    }

    #[test]
    fn run_counts_saturate_instead_of_wrapping() {
        let summary = RunSummary {
            categories: vec![CategorySummary {
                category: Category::Other,
                listed: 3,
                succeeded: 2,
                failed: 1,
                coupons: u64::MAX,
            }],
        };
        let counts = run_counts(&summary);
        assert_eq!(counts.domains_succeeded, 2);
        assert_eq!(counts.domains_failed, 1);
        assert_eq!(counts.coupons_persisted, i64::MAX);
    }

    #[tokio::test]
    async fn scheduler_starts_without_sweep_cron() {
        let pool = crate::api::test_support::unreachable_pool();
        let mut scheduler = build_scheduler(pool, Arc::new(config(None)), None)
            .await
            .expect("scheduler should start");
        scheduler.shutdown().await.expect("shutdown");
    }
}
