//! Code resolution for offers whose code sits behind a reveal modal.
//!
//! Resolution never fails its caller: every error path downgrades to the
//! sentinel placeholder, which normalization later drops.

mod pool;
mod strategy;

use std::sync::Arc;

use coupondb_core::{MerchantDomain, RawOffer, ScrapeConfig, SENTINEL_CODE};
use futures::stream::{self, StreamExt};

use crate::render::{render_page, Document, RenderOptions, Renderer};
use crate::retry::jittered;
use crate::site::SiteMap;

pub use pool::{ContextPool, PooledContext};
pub use strategy::{cascade_wait_selector, extract_code, ExtractionStrategy, REVEAL_CASCADE};

pub struct CodeResolver {
    renderer: Arc<dyn Renderer>,
    site: SiteMap,
    options: RenderOptions,
    pool_size: usize,
    reveal_delay_ms: u64,
}

impl CodeResolver {
    #[must_use]
    pub fn new(renderer: Arc<dyn Renderer>, config: &ScrapeConfig) -> Self {
        Self {
            renderer,
            site: SiteMap::new(&config.base_url),
            options: RenderOptions::reveal(config, &cascade_wait_selector()),
            pool_size: config.reveal_pool_size,
            reveal_delay_ms: config.reveal_delay_ms,
        }
    }

    /// Resolves a single reveal reference in a fresh context.
    pub async fn resolve(&self, reveal_ref: &str) -> String {
        let url = self.site.reveal_url(reveal_ref);
        match render_page(self.renderer.as_ref(), &url, &self.options).await {
            Ok(document) => code_from(&document),
            Err(e) => {
                tracing::debug!(url, error = %e, "reveal exhausted");
                SENTINEL_CODE.to_string()
            }
        }
    }

    /// Resolves every offer in `offers` that still needs a reveal, writing the
    /// result (possibly the sentinel) into its `direct_code`.
    ///
    /// Reveals run in parallel over a pool of reused contexts that is opened
    /// for this call and closed before it returns. Returns the number of
    /// offers that gained a usable code.
    pub async fn resolve_all(&self, domain: &MerchantDomain, offers: &mut [RawOffer]) -> usize {
        let pending: Vec<(usize, usize, String)> = offers
            .iter()
            .enumerate()
            .filter(|(_, offer)| offer.needs_reveal())
            .filter_map(|(index, offer)| {
                offer
                    .reveal_ref
                    .clone()
                    .map(|reveal_ref| (index, offer.local_id, reveal_ref))
            })
            .collect();
        if pending.is_empty() {
            return 0;
        }

        let pool = ContextPool::new(Arc::clone(&self.renderer), self.pool_size);
        let resolved: Vec<(usize, String)> = stream::iter(pending)
            .map(|(index, offer_id, reveal_ref)| {
                let pool = &pool;
                async move {
                    let code = self.resolve_pooled(pool, domain, offer_id, &reveal_ref).await;
                    (index, code)
                }
            })
            .buffer_unordered(self.pool_size.max(1))
            .collect()
            .await;
        pool.close().await;

        let mut found = 0;
        for (index, code) in resolved {
            if code != SENTINEL_CODE {
                found += 1;
            }
            offers[index].direct_code = Some(code);
        }
        tracing::debug!(domain = %domain, found, "resolved reveal codes");
        found
    }

    async fn resolve_pooled(
        &self,
        pool: &ContextPool,
        domain: &MerchantDomain,
        offer_id: usize,
        reveal_ref: &str,
    ) -> String {
        let url = self.site.reveal_url(reveal_ref);
        let mut context = match pool.acquire().await {
            Ok(context) => context,
            Err(e) => {
                tracing::warn!(
                    domain = %domain,
                    offer_id,
                    error = %e,
                    "no reveal context available"
                );
                return SENTINEL_CODE.to_string();
            }
        };

        let code = match context.navigate(&url, &self.options).await {
            Ok(document) => code_from(&document),
            Err(e) => {
                tracing::debug!(domain = %domain, offer_id, url, error = %e, "reveal exhausted");
                SENTINEL_CODE.to_string()
            }
        };

        tokio::time::sleep(jittered(self.reveal_delay_ms)).await;
        context.release().await;
        code
    }
}

fn code_from(document: &Document) -> String {
    extract_code(&document.parse()).unwrap_or_else(|| SENTINEL_CODE.to_string())
}
