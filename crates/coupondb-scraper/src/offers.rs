//! Offer-card extraction from a merchant's page.

use std::sync::Arc;

use coupondb_core::{is_placeholder_code, MerchantDomain, RawOffer, ScrapeConfig};
use scraper::Html;

use crate::error::RenderError;
use crate::html;
use crate::render::{render_page, RenderOptions, Renderer};
use crate::site::{
    SiteMap, CODE_ATTR, DEFAULT_DISCOUNT, DEFAULT_TERMS, DIRECT_CODE_SELECTOR, DISCOUNT_SELECTOR,
    OFFER_CARD_SELECTOR, REVEAL_CONTROL_SELECTOR, REVEAL_REF_ATTR, TERMS_SELECTOR, VERIFIED_ATTR,
    VERIFIED_TRUTHY,
};

pub struct OfferExtractor {
    renderer: Arc<dyn Renderer>,
    site: SiteMap,
    options: RenderOptions,
}

impl OfferExtractor {
    #[must_use]
    pub fn new(renderer: Arc<dyn Renderer>, config: &ScrapeConfig) -> Self {
        Self {
            renderer,
            site: SiteMap::new(&config.base_url),
            options: RenderOptions::offers(config),
        }
    }

    /// Renders the merchant page and returns its coupon offers in document order.
    ///
    /// An empty result is a valid outcome (the merchant has no coupons).
    ///
    /// # Errors
    ///
    /// Returns the [`RenderError`] if the page could not be rendered, so the
    /// caller can retry the domain.
    pub async fn extract_offers(
        &self,
        domain: &MerchantDomain,
    ) -> Result<Vec<RawOffer>, RenderError> {
        let url = self.site.offers_url(domain);
        let document = render_page(self.renderer.as_ref(), &url, &self.options).await?;
        let offers = parse_offer_cards(&document.parse());
        tracing::debug!(
            domain = %domain,
            offers = offers.len(),
            pending_reveals = offers.iter().filter(|o| o.needs_reveal()).count(),
            "extracted offer cards"
        );
        Ok(offers)
    }
}

/// Parses every coupon-typed offer card. Deal cards never match.
///
/// A direct code equal to the sentinel placeholder is treated as absent, so
/// the offer falls back to its reveal reference if it has one.
#[must_use]
pub fn parse_offer_cards(document: &Html) -> Vec<RawOffer> {
    let Some(card_sel) = html::selector(OFFER_CARD_SELECTOR) else {
        return Vec::new();
    };
    let code_hosts = format!("{REVEAL_CONTROL_SELECTOR}, {DIRECT_CODE_SELECTOR}");

    document
        .select(&card_sel)
        .enumerate()
        .map(|(local_id, card)| {
            let verified = card
                .value()
                .attr(VERIFIED_ATTR)
                .is_some_and(|v| v.trim().eq_ignore_ascii_case(VERIFIED_TRUTHY));

            let direct_code =
                html::attr_in_where(card, &code_hosts, CODE_ATTR, |c| !is_placeholder_code(c));

            RawOffer {
                local_id,
                discount: html::first_text(card, DISCOUNT_SELECTOR)
                    .unwrap_or_else(|| DEFAULT_DISCOUNT.to_string()),
                terms: html::first_text(card, TERMS_SELECTOR)
                    .unwrap_or_else(|| DEFAULT_TERMS.to_string()),
                verified,
                direct_code,
                reveal_ref: html::attr_in(card, REVEAL_CONTROL_SELECTOR, REVEAL_REF_ATTR),
            }
        })
        .collect()
}
