use super::*;
use coupondb_core::SENTINEL_CODE;

fn acme() -> MerchantDomain {
    MerchantDomain::parse("acme.com").unwrap()
}

fn offer(local_id: usize, code: Option<&str>, verified: bool) -> RawOffer {
    RawOffer {
        local_id,
        discount: format!("offer {local_id}"),
        terms: "Terms apply".to_owned(),
        verified,
        direct_code: code.map(str::to_owned),
        reveal_ref: None,
    }
}

#[test]
fn keeps_resolved_codes() {
    let records = normalize(&acme(), &[offer(0, Some("SAVE20"), true)]);
    assert_eq!(
        records,
        vec![CouponRecord {
            domain: acme(),
            code: "SAVE20".to_owned(),
            discount: "offer 0".to_owned(),
            terms: "Terms apply".to_owned(),
            verified: true,
        }]
    );
}

#[test]
fn drops_sentinel_empty_and_missing_codes() {
    let offers = [
        offer(0, None, true),
        offer(1, Some(SENTINEL_CODE), true),
        offer(2, Some("no code required"), false),
        offer(3, Some("   "), false),
        offer(4, Some(""), false),
    ];
    assert!(normalize(&acme(), &offers).is_empty());
}

#[test]
fn never_emits_placeholder_codes() {
    let offers = [
        offer(0, Some("A1"), false),
        offer(1, Some(SENTINEL_CODE), true),
        offer(2, Some(" B2 "), false),
    ];
    for record in normalize(&acme(), &offers) {
        assert!(!is_placeholder_code(&record.code));
        assert_eq!(record.code, record.code.trim());
    }
}

#[test]
fn one_record_per_code() {
    let offers = [
        offer(0, Some("DUP"), false),
        offer(1, Some("OTHER"), false),
        offer(2, Some(" DUP"), false),
    ];
    let records = normalize(&acme(), &offers);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].code, "DUP");
    assert_eq!(records[1].code, "OTHER");
}

#[test]
fn verified_duplicate_wins_regardless_of_order() {
    let verified_first = [offer(0, Some("DUP"), true), offer(1, Some("DUP"), false)];
    let records = normalize(&acme(), &verified_first);
    assert!(records[0].verified);
    assert_eq!(records[0].discount, "offer 0");

    let verified_last = [offer(0, Some("DUP"), false), offer(1, Some("DUP"), true)];
    let records = normalize(&acme(), &verified_last);
    assert!(records[0].verified);
    assert_eq!(records[0].discount, "offer 1");
}

#[test]
fn later_duplicate_wins_on_equal_verification() {
    let offers = [offer(0, Some("DUP"), true), offer(1, Some("DUP"), true)];
    let records = normalize(&acme(), &offers);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].discount, "offer 1");
}

#[test]
fn normalizing_twice_is_stable() {
    let offers = [
        offer(0, Some("X"), false),
        offer(1, Some("Y"), true),
        offer(2, Some("X"), true),
    ];
    assert_eq!(normalize(&acme(), &offers), normalize(&acme(), &offers));
}
