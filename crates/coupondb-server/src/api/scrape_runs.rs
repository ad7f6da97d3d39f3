use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct ScrapeRunsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct ScrapeRunItem {
    scrape_run_id: Uuid,
    scope: String,
    trigger_source: String,
    status: String,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    domains_succeeded: i32,
    domains_failed: i32,
    coupons_persisted: i64,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<coupondb_db::ScrapeRunRow> for ScrapeRunItem {
    fn from(row: coupondb_db::ScrapeRunRow) -> Self {
        Self {
            scrape_run_id: row.public_id,
            scope: row.scope,
            trigger_source: row.trigger_source,
            status: row.status,
            started_at: row.started_at,
            completed_at: row.completed_at,
            domains_succeeded: row.domains_succeeded,
            domains_failed: row.domains_failed,
            coupons_persisted: row.coupons_persisted,
            error_message: row.error_message,
            created_at: row.created_at,
        }
    }
}

pub(super) async fn list_scrape_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ScrapeRunsQuery>,
) -> Result<Json<ApiResponse<Vec<ScrapeRunItem>>>, ApiError> {
    let rows = coupondb_db::list_scrape_runs(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(ScrapeRunItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}
