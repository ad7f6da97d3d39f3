//! Read-only view of recent scrape runs.

use chrono::{DateTime, Utc};
use coupondb_db::ScrapeRunRow;

/// Format an optional timestamp for display, returning `"—"` when `None`.
fn fmt_time(ts: Option<DateTime<Utc>>) -> String {
    ts.map_or_else(
        || "\u{2014}".to_string(),
        |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

fn format_row(run: &ScrapeRunRow) -> String {
    let error = run
        .error_message
        .as_deref()
        .unwrap_or("")
        .replace('|', "\\|");
    format!(
        "| {} | {} | {} | {} | {} | {} | {} | {} | {} |",
        run.id,
        run.scope,
        run.trigger_source,
        run.status,
        fmt_time(run.started_at),
        fmt_time(run.completed_at),
        run.domains_succeeded,
        run.domains_failed,
        if error.is_empty() {
            run.coupons_persisted.to_string()
        } else {
            format!("{} ({error})", run.coupons_persisted)
        },
    )
}

/// Print the most recent `limit` scrape runs as a markdown table.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_list_runs(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<()> {
    let runs = coupondb_db::list_scrape_runs(pool, limit).await?;

    if runs.is_empty() {
        println!("no scrape runs recorded");
        return Ok(());
    }

    println!("| id | scope | trigger | status | started | completed | ok | failed | coupons |");
    println!("|---|---|---|---|---|---|---|---|---|");
    for run in &runs {
        println!("{}", format_row(run));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(error: Option<&str>) -> ScrapeRunRow {
        ScrapeRunRow {
            id: 3,
            public_id: uuid::Uuid::nil(),
            scope: "sweep".to_string(),
            trigger_source: "cli".to_string(),
            status: "failed".to_string(),
            started_at: None,
            completed_at: None,
            domains_succeeded: 0,
            domains_failed: 4,
            coupons_persisted: 0,
            error_message: error.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn missing_timestamps_render_as_dash() {
        assert_eq!(fmt_time(None), "\u{2014}");
    }

    #[test]
    fn row_escapes_pipes_in_error() {
        let line = format_row(&row(Some("a|b")));
        assert!(line.contains("a\\|b"), "{line}");
        assert!(line.starts_with("| 3 | sweep | cli | failed |"));
    }

    #[test]
    fn row_without_error_shows_bare_count() {
        let line = format_row(&row(None));
        assert!(line.ends_with("| 0 | 4 | 0 |"), "{line}");
    }
}
