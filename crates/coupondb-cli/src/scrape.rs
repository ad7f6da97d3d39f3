//! Scrape command handlers for the CLI.
//!
//! Sweeps and single-domain scrapes that write to the database are tracked as
//! `scrape_runs` rows. Per-domain failures are tallied by the orchestrator
//! rather than propagated; only a run where nothing succeeded is an error.

use std::sync::Arc;

use coupondb_core::{AppConfig, Category, CouponSink, MerchantDomain};
use coupondb_db::{PgCouponSink, ScrapeRunCounts};
use coupondb_scraper::{build_renderer, DomainLister, Orchestrator, RunSummary};

/// List the merchants each category would sweep, without touching offers or
/// the database.
///
/// # Errors
///
/// Returns an error if the renderer cannot be started.
pub(crate) async fn run_sweep_dry_run(
    config: &AppConfig,
    categories: &[Category],
) -> anyhow::Result<()> {
    let renderer = build_renderer(&config.scrape).await?;
    let lister = DomainLister::new(Arc::clone(&renderer), &config.scrape);

    let mut total = 0_usize;
    for category in categories {
        let domains = lister.list_domains(*category).await;
        total += domains.len();
        let names: Vec<&str> = domains.iter().map(MerchantDomain::as_str).collect();
        println!(
            "dry-run: category {category}: {} merchants [{}]",
            domains.len(),
            names.join(", ")
        );
    }
    renderer.shutdown().await;
    println!(
        "dry-run: would sweep {total} merchants across {} categories",
        categories.len()
    );
    Ok(())
}

/// Sweep `categories`, persisting coupons and recording a scrape run.
///
/// # Errors
///
/// Returns an error if the renderer cannot be started, the run cannot be
/// created, or no domain succeeded.
pub(crate) async fn run_sweep(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    categories: &[Category],
) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(pool, config).await?;
    let scope = sweep_scope(categories, &config.scrape.categories);
    let result = sweep_and_record(pool, &orchestrator, categories, &scope).await;
    orchestrator.shutdown().await;
    result
}

async fn sweep_and_record(
    pool: &sqlx::PgPool,
    orchestrator: &Orchestrator,
    categories: &[Category],
    scope: &str,
) -> anyhow::Result<()> {
    let run = coupondb_db::create_scrape_run(pool, scope, "cli").await?;
    if let Err(e) = coupondb_db::start_scrape_run(pool, run.id).await {
        fail_run_best_effort(pool, run.id, ScrapeRunCounts::default(), format!("{e:#}")).await;
        return Err(e.into());
    }

    let summary = orchestrator.sweep(categories).await;
    print_summary(&summary);
    let counts = run_counts(&summary);

    match summary.into_result() {
        Ok(_) => {
            if let Err(err) = coupondb_db::complete_scrape_run(pool, run.id, counts).await {
                fail_run_best_effort(pool, run.id, counts, format!("{err:#}")).await;
                return Err(err.into());
            }
            Ok(())
        }
        Err(err) => {
            let message = err.to_string();
            fail_run_best_effort(pool, run.id, counts, message.clone()).await;
            anyhow::bail!("{message}");
        }
    }
}

/// Scrape one merchant and print its normalized coupons as JSON without
/// writing to the database.
///
/// # Errors
///
/// Returns an error if the renderer cannot be started or every attempt failed.
pub(crate) async fn run_scrape_dry_run(
    config: &AppConfig,
    domain: &MerchantDomain,
) -> anyhow::Result<()> {
    let renderer = build_renderer(&config.scrape).await?;
    let orchestrator = Orchestrator::new(
        Arc::new(config.scrape.clone()),
        renderer,
        Arc::new(DiscardSink),
    );

    let report = orchestrator.preview_domain(domain).await;
    orchestrator.shutdown().await;
    let report = report?;
    println!("{}", serde_json::to_string_pretty(&report.records)?);
    println!(
        "dry-run: {} coupon cards, {} distinct codes for {domain}",
        report.offers,
        report.records.len()
    );
    Ok(())
}

/// Scrape and persist one merchant, recording a single-domain scrape run.
///
/// # Errors
///
/// Returns an error if the run cannot be created or every attempt failed.
pub(crate) async fn run_scrape(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    domain: &MerchantDomain,
) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(pool, config).await?;
    let result = scrape_and_record(pool, &orchestrator, domain).await;
    orchestrator.shutdown().await;
    result
}

async fn scrape_and_record(
    pool: &sqlx::PgPool,
    orchestrator: &Orchestrator,
    domain: &MerchantDomain,
) -> anyhow::Result<()> {
    let run = coupondb_db::create_scrape_run(pool, &format!("domain:{domain}"), "cli").await?;
    if let Err(e) = coupondb_db::start_scrape_run(pool, run.id).await {
        fail_run_best_effort(pool, run.id, ScrapeRunCounts::default(), format!("{e:#}")).await;
        return Err(e.into());
    }

    match orchestrator.scrape_domain(domain).await {
        Ok(report) => {
            let counts = ScrapeRunCounts {
                domains_succeeded: 1,
                domains_failed: 0,
                coupons_persisted: i64::try_from(report.persisted).unwrap_or(i64::MAX),
            };
            if let Err(err) = coupondb_db::complete_scrape_run(pool, run.id, counts).await {
                fail_run_best_effort(pool, run.id, counts, format!("{err:#}")).await;
                return Err(err.into());
            }
            println!(
                "{domain}: {} coupon cards, {} codes persisted",
                report.offers, report.persisted
            );
            Ok(())
        }
        Err(err) => {
            let counts = ScrapeRunCounts {
                domains_succeeded: 0,
                domains_failed: 1,
                coupons_persisted: 0,
            };
            fail_run_best_effort(pool, run.id, counts, err.to_string()).await;
            Err(err.into())
        }
    }
}

async fn build_orchestrator(
    pool: &sqlx::PgPool,
    config: &AppConfig,
) -> anyhow::Result<Orchestrator> {
    let renderer = build_renderer(&config.scrape).await?;
    let sink: Arc<dyn CouponSink> = Arc::new(PgCouponSink::new(pool.clone()));
    Ok(Orchestrator::new(
        Arc::new(config.scrape.clone()),
        renderer,
        sink,
    ))
}

/// `sweep` for the configured category list, otherwise `sweep:<c1>,<c2>`.
pub(crate) fn sweep_scope(categories: &[Category], configured: &[Category]) -> String {
    if categories == configured {
        return "sweep".to_string();
    }
    let tokens: Vec<String> = categories.iter().map(ToString::to_string).collect();
    format!("sweep:{}", tokens.join(","))
}

pub(crate) fn run_counts(summary: &RunSummary) -> ScrapeRunCounts {
    ScrapeRunCounts {
        domains_succeeded: i32::try_from(summary.succeeded()).unwrap_or(i32::MAX),
        domains_failed: i32::try_from(summary.failed()).unwrap_or(i32::MAX),
        coupons_persisted: i64::try_from(summary.coupons()).unwrap_or(i64::MAX),
    }
}

fn print_summary(summary: &RunSummary) {
    println!("| category | listed | succeeded | failed | coupons |");
    println!("|---|---|---|---|---|");
    for c in &summary.categories {
        println!(
            "| {} | {} | {} | {} | {} |",
            c.category, c.listed, c.succeeded, c.failed, c.coupons
        );
    }
    println!(
        "| total | {} | {} | {} | {} |",
        summary.attempted(),
        summary.succeeded(),
        summary.failed(),
        summary.coupons()
    );
}

/// Attempt to mark a scrape run as failed, logging any secondary error.
async fn fail_run_best_effort(
    pool: &sqlx::PgPool,
    run_id: i64,
    counts: ScrapeRunCounts,
    message: String,
) {
    if let Err(mark_err) = coupondb_db::fail_scrape_run(pool, run_id, counts, &message).await {
        tracing::error!(
            run_id,
            error = %mark_err,
            "failed to mark scrape run as failed"
        );
    }
}

/// Sink for previews; [`Orchestrator::preview_domain`] never calls it.
struct DiscardSink;

#[async_trait::async_trait]
impl CouponSink for DiscardSink {
    async fn upsert(
        &self,
        _rows: &[coupondb_core::CouponRecord],
    ) -> Result<u64, coupondb_core::SinkError> {
        Ok(0)
    }
}
