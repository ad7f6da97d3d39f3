//! Database operations for `scrape_runs`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const RUN_COLUMNS: &str = "id, public_id, scope, trigger_source, status, started_at, completed_at, \
                           domains_succeeded, domains_failed, coupons_persisted, error_message, \
                           created_at";

/// A row from the `scrape_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScrapeRunRow {
    pub id: i64,
    pub public_id: Uuid,
    /// `sweep` for a multi-category run, otherwise `domain:<name>`.
    pub scope: String,
    pub trigger_source: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub domains_succeeded: i32,
    pub domains_failed: i32,
    pub coupons_persisted: i64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome counters recorded when a run finishes, successfully or not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeRunCounts {
    pub domains_succeeded: i32,
    pub domains_failed: i32,
    pub coupons_persisted: i64,
}

/// Creates a new scrape run in `queued` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_scrape_run(
    pool: &PgPool,
    scope: &str,
    trigger_source: &str,
) -> Result<ScrapeRunRow, DbError> {
    let row = sqlx::query_as::<_, ScrapeRunRow>(&format!(
        "INSERT INTO scrape_runs (public_id, scope, trigger_source, status) \
         VALUES ($1, $2, $3, 'queued') \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(scope)
    .bind(trigger_source)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a run as `running` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidScrapeRunTransition`] if the run is not `queued`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn start_scrape_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scrape_runs \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'queued'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidScrapeRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

/// Marks a running run as `succeeded` and records its counters.
///
/// # Errors
///
/// Returns [`DbError::InvalidScrapeRunTransition`] if the run is not `running`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn complete_scrape_run(
    pool: &PgPool,
    id: i64,
    counts: ScrapeRunCounts,
) -> Result<(), DbError> {
    finish(pool, id, "succeeded", counts, None).await
}

/// Marks a running run as `failed`, recording counters and `error_message`.
///
/// # Errors
///
/// Returns [`DbError::InvalidScrapeRunTransition`] if the run is not `running`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn fail_scrape_run(
    pool: &PgPool,
    id: i64,
    counts: ScrapeRunCounts,
    error_message: &str,
) -> Result<(), DbError> {
    finish(pool, id, "failed", counts, Some(error_message)).await
}

async fn finish(
    pool: &PgPool,
    id: i64,
    status: &str,
    counts: ScrapeRunCounts,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scrape_runs \
         SET status = $1, completed_at = NOW(), \
             domains_succeeded = $2, domains_failed = $3, coupons_persisted = $4, \
             error_message = $5 \
         WHERE id = $6 AND status = 'running'",
    )
    .bind(status)
    .bind(counts.domains_succeeded)
    .bind(counts.domains_failed)
    .bind(counts.coupons_persisted)
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidScrapeRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_scrape_run(pool: &PgPool, id: i64) -> Result<ScrapeRunRow, DbError> {
    sqlx::query_as::<_, ScrapeRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM scrape_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_scrape_runs(pool: &PgPool, limit: i64) -> Result<Vec<ScrapeRunRow>, DbError> {
    let rows = sqlx::query_as::<_, ScrapeRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM scrape_runs ORDER BY created_at DESC, id DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
