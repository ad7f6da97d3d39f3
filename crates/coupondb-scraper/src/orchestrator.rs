//! Category sweep: listing, batching, per-domain retry, delays, summary.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use coupondb_core::{Category, CouponRecord, CouponSink, MerchantDomain, ScrapeConfig};
use futures::stream::{self, StreamExt};

use crate::error::ScraperError;
use crate::listing::DomainLister;
use crate::normalize::normalize;
use crate::offers::OfferExtractor;
use crate::render::Renderer;
use crate::retry::{jittered, retry_fixed};
use crate::reveal::CodeResolver;

/// Phases of a sweep, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    ListingCategory,
    BatchingDomains,
    ProcessingBatch,
    Delaying,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::ListingCategory => "listing_category",
            RunState::BatchingDomains => "batching_domains",
            RunState::ProcessingBatch => "processing_batch",
            RunState::Delaying => "delaying",
            RunState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Result of one successfully processed merchant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainReport {
    pub domain: MerchantDomain,
    /// Coupon cards found on the merchant page.
    pub offers: usize,
    pub records: Vec<CouponRecord>,
    /// Rows the sink reported written; zero for previews.
    pub persisted: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySummary {
    pub category: Category,
    pub listed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub coupons: u64,
}

impl CategorySummary {
    fn new(category: Category) -> Self {
        Self {
            category,
            listed: 0,
            succeeded: 0,
            failed: 0,
            coupons: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub categories: Vec<CategorySummary>,
}

impl RunSummary {
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.categories.iter().map(|c| c.listed).sum()
    }

    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.categories.iter().map(|c| c.succeeded).sum()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.categories.iter().map(|c| c.failed).sum()
    }

    #[must_use]
    pub fn coupons(&self) -> u64 {
        self.categories.iter().map(|c| c.coupons).sum()
    }

    /// Passes the summary through unless no domain succeeded.
    ///
    /// A run that listed nothing at all also counts as total failure.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::AllDomainsFailed`] when `succeeded() == 0`.
    pub fn into_result(self) -> Result<Self, ScraperError> {
        if self.succeeded() == 0 {
            return Err(ScraperError::AllDomainsFailed {
                attempted: self.attempted(),
            });
        }
        Ok(self)
    }
}

/// Drives the full pipeline for a list of categories.
pub struct Orchestrator {
    config: Arc<ScrapeConfig>,
    renderer: Arc<dyn Renderer>,
    sink: Arc<dyn CouponSink>,
    lister: DomainLister,
    extractor: OfferExtractor,
    resolver: CodeResolver,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        config: Arc<ScrapeConfig>,
        renderer: Arc<dyn Renderer>,
        sink: Arc<dyn CouponSink>,
    ) -> Self {
        Self {
            lister: DomainLister::new(Arc::clone(&renderer), &config),
            extractor: OfferExtractor::new(Arc::clone(&renderer), &config),
            resolver: CodeResolver::new(Arc::clone(&renderer), &config),
            renderer,
            config,
            sink,
        }
    }

    /// Shuts the shared renderer down. Call once no more scrapes will run.
    pub async fn shutdown(&self) {
        self.renderer.shutdown().await;
    }

    #[must_use]
    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    #[must_use]
    pub fn lister(&self) -> &DomainLister {
        &self.lister
    }

    /// Sweeps the configured categories.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::AllDomainsFailed`] if no domain succeeded.
    pub async fn run(&self) -> Result<RunSummary, ScraperError> {
        self.sweep(&self.config.categories).await.into_result()
    }

    /// Sweeps `categories` in order and returns the per-category tally.
    /// Never fails; see [`RunSummary::into_result`].
    pub async fn sweep(&self, categories: &[Category]) -> RunSummary {
        let mut state = RunState::Idle;
        let mut summary = RunSummary::default();

        for (index, &category) in categories.iter().enumerate() {
            transition(&mut state, RunState::ListingCategory, Some(category));
            let domains = self.lister.list_domains(category).await;

            let mut tally = CategorySummary::new(category);
            tally.listed = domains.len();

            if domains.is_empty() {
                tracing::info!(%category, "no merchants listed, skipping category");
            } else {
                self.process_category(&mut state, category, &domains, &mut tally)
                    .await;
            }

            tracing::info!(
                %category,
                listed = tally.listed,
                succeeded = tally.succeeded,
                failed = tally.failed,
                coupons = tally.coupons,
                "category complete"
            );
            summary.categories.push(tally);

            if index + 1 < categories.len() {
                transition(&mut state, RunState::Delaying, Some(category));
                tokio::time::sleep(Duration::from_millis(self.config.inter_category_delay_ms))
                    .await;
            }
        }

        transition(&mut state, RunState::Done, None);
        tracing::info!(
            categories = summary.categories.len(),
            attempted = summary.attempted(),
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            coupons = summary.coupons(),
            "sweep finished"
        );
        summary
    }

    async fn process_category(
        &self,
        state: &mut RunState,
        category: Category,
        domains: &[MerchantDomain],
        tally: &mut CategorySummary,
    ) {
        transition(state, RunState::BatchingDomains, Some(category));
        let batches: Vec<&[MerchantDomain]> =
            domains.chunks(self.config.batch_size.max(1)).collect();
        let batch_count = batches.len();
        let concurrency = self.config.batch_concurrency();

        for (batch_index, batch) in batches.into_iter().enumerate() {
            transition(state, RunState::ProcessingBatch, Some(category));
            tracing::debug!(
                %category,
                batch = batch_index + 1,
                of = batch_count,
                size = batch.len(),
                "processing batch"
            );

            let futures: Vec<_> = batch
                .iter()
                .map(|domain| async move { (domain, self.scrape_domain(domain).await) })
                .collect();
            let outcomes: Vec<(&MerchantDomain, Result<DomainReport, ScraperError>)> =
                stream::iter(futures)
                    .buffer_unordered(concurrency)
                    .collect()
                    .await;

            for (domain, outcome) in outcomes {
                match outcome {
                    Ok(report) => {
                        tally.succeeded += 1;
                        tally.coupons += report.persisted;
                    }
                    Err(e) => {
                        tally.failed += 1;
                        tracing::error!(%category, domain = %domain, error = %e, "domain failed");
                    }
                }
            }

            if batch_index + 1 < batch_count {
                transition(state, RunState::Delaying, Some(category));
                tokio::time::sleep(jittered(self.config.inter_batch_delay_ms)).await;
            }
        }
    }

    /// Extracts, resolves, normalizes and persists one merchant, retrying the
    /// whole sequence on render failures and domain timeouts.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's error once retries are exhausted, or a sink
    /// error immediately.
    pub async fn scrape_domain(
        &self,
        domain: &MerchantDomain,
    ) -> Result<DomainReport, ScraperError> {
        self.run_domain(domain, true).await
    }

    /// Like [`Orchestrator::scrape_domain`] but never writes to the sink.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's error once retries are exhausted.
    pub async fn preview_domain(
        &self,
        domain: &MerchantDomain,
    ) -> Result<DomainReport, ScraperError> {
        self.run_domain(domain, false).await
    }

    async fn run_domain(
        &self,
        domain: &MerchantDomain,
        persist: bool,
    ) -> Result<DomainReport, ScraperError> {
        retry_fixed(
            domain.as_str(),
            self.config.domain_retries,
            self.config.retry_backoff_ms,
            |attempt| self.attempt_domain(domain, attempt, persist),
        )
        .await
    }

    async fn attempt_domain(
        &self,
        domain: &MerchantDomain,
        attempt: u32,
        persist: bool,
    ) -> Result<DomainReport, ScraperError> {
        let timeout = self.config.domain_timeout();
        match tokio::time::timeout(timeout, self.process_domain(domain, persist)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(domain = %domain, attempt, "domain timed out");
                Err(ScraperError::DomainTimeout {
                    domain: domain.to_string(),
                    timeout_ms: self.config.domain_timeout_ms,
                })
            }
        }
    }

    async fn process_domain(
        &self,
        domain: &MerchantDomain,
        persist: bool,
    ) -> Result<DomainReport, ScraperError> {
        let mut offers = self.extractor.extract_offers(domain).await?;
        if offers.is_empty() {
            tracing::info!(domain = %domain, "no coupon offers on merchant page");
            return Ok(DomainReport {
                domain: domain.clone(),
                offers: 0,
                records: Vec::new(),
                persisted: 0,
            });
        }

        self.resolver.resolve_all(domain, &mut offers).await;
        let records = normalize(domain, &offers);

        let persisted = if persist && !records.is_empty() {
            match self.sink.upsert(&records).await {
                Ok(written) => written,
                Err(e) => {
                    tracing::error!(
                        domain = %domain,
                        rows = records.len(),
                        error = %e,
                        "coupon sink write failed"
                    );
                    return Err(e.into());
                }
            }
        } else {
            0
        };

        tracing::info!(
            domain = %domain,
            offers = offers.len(),
            coupons = records.len(),
            persisted,
            "domain scraped"
        );
        Ok(DomainReport {
            domain: domain.clone(),
            offers: offers.len(),
            records,
            persisted,
        })
    }
}

fn transition(state: &mut RunState, next: RunState, category: Option<Category>) {
    match category {
        Some(category) => tracing::debug!(from = %state, to = %next, %category, "run state"),
        None => tracing::debug!(from = %state, to = %next, "run state"),
    }
    *state = next;
}
