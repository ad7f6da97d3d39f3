//! Conversion from resolved [`RawOffer`]s to de-duplicated [`CouponRecord`]s.

use std::collections::HashMap;

use coupondb_core::{is_placeholder_code, CouponRecord, MerchantDomain, RawOffer};

/// Normalizes one merchant's offers.
///
/// - Offers without a usable code (absent, empty, or the sentinel) are dropped.
/// - Codes are trimmed; one record is kept per `(domain, code)`.
/// - On a duplicate code, a verified offer beats an unverified one; between
///   offers of equal verification the later one in document order wins.
///
/// Records come back in the order their code was first seen.
#[must_use]
pub fn normalize(domain: &MerchantDomain, offers: &[RawOffer]) -> Vec<CouponRecord> {
    let mut records: Vec<CouponRecord> = Vec::new();
    let mut by_code: HashMap<String, usize> = HashMap::new();

    for offer in offers {
        let Some(code) = offer.direct_code.as_deref().map(str::trim) else {
            continue;
        };
        if is_placeholder_code(code) {
            continue;
        }

        let record = CouponRecord {
            domain: domain.clone(),
            code: code.to_string(),
            discount: offer.discount.clone(),
            terms: offer.terms.clone(),
            verified: offer.verified,
        };

        match by_code.get(code) {
            Some(&index) => {
                if records[index].verified && !record.verified {
                    continue;
                }
                records[index] = record;
            }
            None => {
                by_code.insert(record.code.clone(), records.len());
                records.push(record);
            }
        }
    }

    records
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
