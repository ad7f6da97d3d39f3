//! URL layout and markup contract of the coupon aggregation site.

use coupondb_core::{Category, MerchantDomain};

/// Path prefix of merchant store links on listing pages.
pub const STORE_LINK_PREFIX: &str = "/site/";

pub const STORE_LINK_SELECTOR: &str = r#"a[href^="/site/"]"#;
pub const OFFER_CARD_SELECTOR: &str = r#".offer-card[data-type="coupon"]"#;
pub const DISCOUNT_SELECTOR: &str = ".offer-title";
pub const TERMS_SELECTOR: &str = ".offer-description";
pub const REVEAL_CONTROL_SELECTOR: &str = ".show-code";
pub const DIRECT_CODE_SELECTOR: &str = "[data-code]";

pub const VERIFIED_ATTR: &str = "data-is-verified";
pub const VERIFIED_TRUTHY: &str = "true";
pub const CODE_ATTR: &str = "data-code";
pub const REVEAL_REF_ATTR: &str = "data-modal";
pub const CLIPBOARD_ATTR: &str = "data-clipboard-text";

pub const DEFAULT_DISCOUNT: &str = "Discount";
pub const DEFAULT_TERMS: &str = "Terms apply";

/// Builds site URLs relative to a base origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteMap {
    base_url: String,
}

impl SiteMap {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/site/browse/{token}/all`
    #[must_use]
    pub fn listing_url(&self, category: Category) -> String {
        format!("{}/site/browse/{}/all", self.base_url, category.url_token())
    }

    /// `{base}/site/{domain}`
    #[must_use]
    pub fn offers_url(&self, domain: &MerchantDomain) -> String {
        format!("{}{STORE_LINK_PREFIX}{}", self.base_url, domain.as_str())
    }

    /// Resolves a reveal reference against the base URL. Absolute references
    /// are returned unchanged.
    #[must_use]
    pub fn reveal_url(&self, reveal_ref: &str) -> String {
        let reveal_ref = reveal_ref.trim();
        if reveal_ref.starts_with("http://") || reveal_ref.starts_with("https://") {
            return reveal_ref.to_string();
        }
        if reveal_ref.starts_with('/') {
            format!("{}{reveal_ref}", self.base_url)
        } else {
            format!("{}/{reveal_ref}", self.base_url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> SiteMap {
        SiteMap::new("https://couponfollow.com/")
    }

    #[test]
    fn listing_url_uses_category_token() {
        assert_eq!(
            site().listing_url(Category::Letter('a')),
            "https://couponfollow.com/site/browse/a/all"
        );
        assert_eq!(
            site().listing_url(Category::Other),
            "https://couponfollow.com/site/browse/number/all"
        );
    }

    #[test]
    fn offers_url_appends_domain() {
        let domain = MerchantDomain::parse("acme.com").unwrap();
        assert_eq!(
            site().offers_url(&domain),
            "https://couponfollow.com/site/acme.com"
        );
    }

    #[test]
    fn reveal_url_handles_relative_and_absolute_refs() {
        assert_eq!(
            site().reveal_url("/modal/123"),
            "https://couponfollow.com/modal/123"
        );
        assert_eq!(
            site().reveal_url("modal/123"),
            "https://couponfollow.com/modal/123"
        );
        assert_eq!(
            site().reveal_url("https://other.example/modal/9"),
            "https://other.example/modal/9"
        );
    }
}
