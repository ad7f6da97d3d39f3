//! Merchant enumeration from category listing pages.

use std::collections::HashSet;
use std::sync::Arc;

use coupondb_core::{Category, MerchantDomain, ScrapeConfig};
use scraper::Html;

use crate::html;
use crate::render::{render_page, RenderOptions, Renderer};
use crate::site::{SiteMap, STORE_LINK_PREFIX, STORE_LINK_SELECTOR};

pub struct DomainLister {
    renderer: Arc<dyn Renderer>,
    site: SiteMap,
    options: RenderOptions,
}

impl DomainLister {
    #[must_use]
    pub fn new(renderer: Arc<dyn Renderer>, config: &ScrapeConfig) -> Self {
        Self {
            renderer,
            site: SiteMap::new(&config.base_url),
            options: RenderOptions::listing(config),
        }
    }

    /// Renders the listing page for `category` and returns its merchants in
    /// first-seen order.
    ///
    /// Never fails: a render error is logged and yields an empty list, which
    /// the orchestrator treats as "nothing to do" for the category.
    pub async fn list_domains(&self, category: Category) -> Vec<MerchantDomain> {
        let url = self.site.listing_url(category);
        match render_page(self.renderer.as_ref(), &url, &self.options).await {
            Ok(document) => {
                let domains = parse_store_links(&document.parse());
                tracing::info!(%category, count = domains.len(), "listed merchant domains");
                domains
            }
            Err(e) => {
                tracing::warn!(%category, url, error = %e, "category listing failed to render");
                Vec::new()
            }
        }
    }
}

/// Extracts unique merchant domains from store-link anchors.
///
/// Anchors whose href, after the store prefix, is not a bare hostname are
/// ignored, as are repeats.
#[must_use]
pub fn parse_store_links(document: &Html) -> Vec<MerchantDomain> {
    let Some(sel) = html::selector(STORE_LINK_SELECTOR) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut domains = Vec::new();
    for anchor in document.select(&sel) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(rest) = href.trim().strip_prefix(STORE_LINK_PREFIX) else {
            continue;
        };
        match MerchantDomain::parse(rest) {
            Ok(domain) => {
                if seen.insert(domain.clone()) {
                    domains.push(domain);
                }
            }
            Err(e) => tracing::trace!(href, reason = e.reason, "skipping non-store link"),
        }
    }
    domains
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(domains: &[MerchantDomain]) -> Vec<&str> {
        domains.iter().map(MerchantDomain::as_str).collect()
    }

    #[test]
    fn strips_prefix_and_keeps_document_order() {
        let doc = Html::parse_document(
            r#"<ul>
                <li><a href="/site/acme.com">Acme</a></li>
                <li><a href="/site/apex.org">Apex</a></li>
            </ul>"#,
        );
        assert_eq!(names(&parse_store_links(&doc)), vec!["acme.com", "apex.org"]);
    }

    #[test]
    fn ignores_duplicates_and_non_store_links() {
        let doc = Html::parse_document(
            r#"
            <a href="/site/acme.com">Acme</a>
            <a href="/site/ACME.com">Acme again</a>
            <a href="/site/browse/b/all">next letter</a>
            <a href="/site/">empty</a>
            <a href="/about">about</a>
            <a href="https://elsewhere.example/site/x.com">offsite</a>
            <a href="/site/localhost">no dot</a>
            <a>no href</a>
            "#,
        );
        assert_eq!(names(&parse_store_links(&doc)), vec!["acme.com"]);
    }

    #[test]
    fn empty_page_yields_no_domains() {
        let doc = Html::parse_document("<html><body></body></html>");
        assert!(parse_store_links(&doc).is_empty());
    }
}
