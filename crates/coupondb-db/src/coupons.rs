//! Database operations for the `coupons` table.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use coupondb_core::{CouponRecord, MerchantDomain};
use sqlx::PgPool;

/// A row from the `coupons` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CouponRow {
    pub id: i64,
    pub domain: String,
    pub code: String,
    pub discount: String,
    pub terms: String,
    pub verified: bool,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Rows inserted versus refreshed by one [`upsert_coupons`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    pub inserted: u64,
    pub updated: u64,
}

impl UpsertCounts {
    #[must_use]
    pub fn total(self) -> u64 {
        self.inserted + self.updated
    }
}

/// Insert new coupons and refresh existing ones in a single round-trip.
///
/// Conflicts on `(domain, code)` overwrite `discount`, `terms` and `verified`
/// with the submitted values and bump `last_seen_at`; `first_seen_at` is kept.
/// Duplicate keys within `records` collapse to one row, since a single
/// `ON CONFLICT` statement cannot touch the same row twice: a verified record
/// beats an unverified one, otherwise the later record wins.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn upsert_coupons(
    pool: &PgPool,
    records: &[CouponRecord],
) -> Result<UpsertCounts, sqlx::Error> {
    let records = preferred_per_key(records);
    if records.is_empty() {
        return Ok(UpsertCounts::default());
    }

    let mut domains: Vec<&str> = Vec::with_capacity(records.len());
    let mut codes: Vec<&str> = Vec::with_capacity(records.len());
    let mut discounts: Vec<&str> = Vec::with_capacity(records.len());
    let mut terms: Vec<&str> = Vec::with_capacity(records.len());
    let mut verified: Vec<bool> = Vec::with_capacity(records.len());

    for record in &records {
        domains.push(record.domain.as_str());
        codes.push(record.code.as_str());
        discounts.push(record.discount.as_str());
        terms.push(record.terms.as_str());
        verified.push(record.verified);
    }

    let rows: Vec<bool> = sqlx::query_scalar::<_, bool>(
        "INSERT INTO coupons (domain, code, discount, terms, verified) \
         SELECT * FROM UNNEST($1::text[], $2::text[], $3::text[], $4::text[], $5::bool[]) \
         ON CONFLICT (domain, code) DO UPDATE SET \
             discount     = EXCLUDED.discount, \
             terms        = EXCLUDED.terms, \
             verified     = EXCLUDED.verified, \
             last_seen_at = NOW() \
         RETURNING (xmax = 0) AS is_new",
    )
    .bind(&domains)
    .bind(&codes)
    .bind(&discounts)
    .bind(&terms)
    .bind(&verified)
    .fetch_all(pool)
    .await?;

    let inserted = rows.iter().filter(|&&is_new| is_new).count() as u64;
    Ok(UpsertCounts {
        inserted,
        updated: rows.len() as u64 - inserted,
    })
}

fn preferred_per_key(records: &[CouponRecord]) -> Vec<&CouponRecord> {
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut kept: Vec<&CouponRecord> = Vec::with_capacity(records.len());
    for record in records {
        let key = (record.domain.as_str(), record.code.as_str());
        match index.get(&key) {
            Some(&i) => {
                if !kept[i].verified || record.verified {
                    kept[i] = record;
                }
            }
            None => {
                index.insert(key, kept.len());
                kept.push(record);
            }
        }
    }
    kept
}

/// Returns every stored coupon for `domain`, verified first, then most recently seen.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn list_coupons_for_domain(
    pool: &PgPool,
    domain: &MerchantDomain,
) -> Result<Vec<CouponRow>, sqlx::Error> {
    sqlx::query_as::<_, CouponRow>(
        "SELECT id, domain, code, discount, terms, verified, first_seen_at, last_seen_at \
         FROM coupons \
         WHERE domain = $1 \
         ORDER BY verified DESC, last_seen_at DESC, id ASC",
    )
    .bind(domain.as_str())
    .fetch_all(pool)
    .await
}
