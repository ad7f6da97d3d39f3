use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use coupondb_core::MerchantDomain;
use coupondb_db::CouponRow;
use serde::Serialize;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub(super) enum CouponSource {
    /// Served from previously persisted rows.
    Stored,
    /// Scraped during this request.
    Live,
}

#[derive(Debug, Serialize)]
pub(super) struct CouponItem {
    code: String,
    discount: String,
    terms: String,
    verified: bool,
    first_seen_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct DomainCoupons {
    domain: String,
    source: CouponSource,
    coupons: Vec<CouponItem>,
}

impl From<CouponRow> for CouponItem {
    fn from(row: CouponRow) -> Self {
        Self {
            code: row.code,
            discount: row.discount,
            terms: row.terms,
            verified: row.verified,
            first_seen_at: row.first_seen_at,
            last_seen_at: row.last_seen_at,
        }
    }
}

/// Stored coupons for a merchant, falling back to a live scrape when nothing
/// is stored and scrape-now is enabled.
pub(super) async fn get_coupons(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(raw_domain): Path<String>,
) -> Result<Json<ApiResponse<DomainCoupons>>, ApiError> {
    let domain = MerchantDomain::parse(&raw_domain)
        .map_err(|e| ApiError::new(req_id.0.clone(), "validation_error", e.to_string()))?;

    let mut rows = coupondb_db::list_coupons_for_domain(&state.pool, &domain)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let mut source = CouponSource::Stored;

    if rows.is_empty() {
        if let Some(scraper) = &state.scraper {
            tracing::info!(domain = %domain, "no stored coupons, scraping now");
            let report = scraper.scrape_domain(&domain).await.map_err(|e| {
                tracing::warn!(domain = %domain, error = %e, "scrape-now failed");
                ApiError::new(
                    req_id.0.clone(),
                    "upstream_error",
                    format!("could not scrape {domain}"),
                )
            })?;
            tracing::info!(
                domain = %domain,
                offers = report.offers,
                persisted = report.persisted,
                "scrape-now complete"
            );

            rows = coupondb_db::list_coupons_for_domain(&state.pool, &domain)
                .await
                .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
            source = CouponSource::Live;
        }
    }

    Ok(Json(ApiResponse {
        data: DomainCoupons {
            domain: domain.to_string(),
            source,
            coupons: rows.into_iter().map(CouponItem::from).collect(),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
