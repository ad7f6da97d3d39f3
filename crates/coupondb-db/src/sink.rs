//! Postgres-backed [`CouponSink`].

use async_trait::async_trait;
use coupondb_core::{CouponRecord, CouponSink, SinkError};
use sqlx::PgPool;

use crate::coupons::upsert_coupons;

/// Writes coupon batches into the `coupons` table.
///
/// Each call is a single statement, so a batch is either fully applied or
/// not at all.
#[derive(Debug, Clone)]
pub struct PgCouponSink {
    pool: PgPool,
}

impl PgCouponSink {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CouponSink for PgCouponSink {
    async fn upsert(&self, rows: &[CouponRecord]) -> Result<u64, SinkError> {
        match upsert_coupons(&self.pool, rows).await {
            Ok(counts) => {
                tracing::debug!(
                    inserted = counts.inserted,
                    updated = counts.updated,
                    "coupon batch upserted"
                );
                Ok(counts.total())
            }
            Err(e) => {
                tracing::error!(error = %e, rows = rows.len(), "coupon upsert failed");
                Err(SinkError::PartialFailure {
                    reason: e.to_string(),
                })
            }
        }
    }
}
