//! The persistence seam between the scrape pipeline and storage.

use async_trait::async_trait;
use thiserror::Error;

use crate::coupons::CouponRecord;

#[derive(Debug, Error)]
pub enum SinkError {
    /// Some or all rows of the batch were not written.
    #[error("coupon upsert failed: {reason}")]
    PartialFailure { reason: String },
}

/// Idempotent destination for normalized coupons.
///
/// Implementations upsert on `(domain, code)`: re-submitting a known row must
/// update it in place rather than insert a duplicate, and the most recently
/// submitted `verified` flag wins. Concurrent callers need no coordination.
#[async_trait]
pub trait CouponSink: Send + Sync {
    /// Upserts `rows`, returning how many were written.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::PartialFailure`] if the write did not complete.
    async fn upsert(&self, rows: &[CouponRecord]) -> Result<u64, SinkError>;
}
