//! Shared fixtures: a canned-HTML renderer that counts context lifecycles and
//! an in-memory coupon sink with upsert semantics.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use coupondb_core::{Category, CouponRecord, CouponSink, RendererKind, ScrapeConfig, SinkError};
use coupondb_scraper::{Document, RenderContext, RenderError, RenderOptions, Renderer};

pub const BASE: &str = "https://couponfollow.test";

pub fn test_config(base_url: &str) -> ScrapeConfig {
    ScrapeConfig {
        base_url: base_url.to_owned(),
        renderer: RendererKind::Http,
        categories: vec![Category::Letter('a')],
        domain_retries: 2,
        retry_backoff_ms: 0,
        reveal_delay_ms: 0,
        inter_batch_delay_ms: 0,
        inter_category_delay_ms: 0,
        ..ScrapeConfig::default()
    }
}

#[derive(Clone)]
pub enum Page {
    Html(String),
    Fail,
    Hang,
}

#[derive(Default)]
pub struct FixtureRenderer {
    pages: Mutex<HashMap<String, Page>>,
    navigations: Mutex<HashMap<String, usize>>,
    pub acquired: AtomicUsize,
    pub closed: AtomicUsize,
    pub shut_down: AtomicBool,
}

impl FixtureRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn page(&self, path: &str, page: Page) {
        self.pages
            .lock()
            .unwrap()
            .insert(format!("{BASE}{path}"), page);
    }

    pub fn html(&self, path: &str, body: &str) {
        self.page(path, Page::Html(body.to_owned()));
    }

    pub fn navigations(&self, path: &str) -> usize {
        self.navigations
            .lock()
            .unwrap()
            .get(&format!("{BASE}{path}"))
            .copied()
            .unwrap_or(0)
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn lookup(&self, url: &str) -> Option<Page> {
        *self
            .navigations
            .lock()
            .unwrap()
            .entry(url.to_owned())
            .or_default() += 1;
        self.pages.lock().unwrap().get(url).cloned()
    }
}

/// Lets the fixture renderer be shared by the test and the pipeline.
pub struct SharedFixture(pub Arc<FixtureRenderer>);

#[async_trait]
impl Renderer for SharedFixture {
    async fn acquire(&self) -> Result<Box<dyn RenderContext>, RenderError> {
        self.0.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FixtureContext {
            renderer: Arc::clone(&self.0),
        }))
    }

    async fn shutdown(&self) {
        self.0.shut_down.store(true, Ordering::SeqCst);
    }
}

struct FixtureContext {
    renderer: Arc<FixtureRenderer>,
}

#[async_trait]
impl RenderContext for FixtureContext {
    async fn navigate(
        &mut self,
        url: &str,
        _options: &RenderOptions,
    ) -> Result<Document, RenderError> {
        match self.renderer.lookup(url) {
            Some(Page::Html(body)) => Ok(Document::new(url, body)),
            Some(Page::Hang) => {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                Err(RenderError::NavigationError {
                    url: url.to_owned(),
                    reason: "hung".into(),
                })
            }
            Some(Page::Fail) => Err(RenderError::NavigationError {
                url: url.to_owned(),
                reason: "net::ERR_CONNECTION_RESET".into(),
            }),
            None => Err(RenderError::NavigationError {
                url: url.to_owned(),
                reason: "HTTP 404 Not Found".into(),
            }),
        }
    }

    async fn close(self: Box<Self>) {
        self.renderer.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Keeps one row per `(domain, code)`; later writes replace earlier ones.
#[derive(Default)]
pub struct MemorySink {
    rows: Mutex<Vec<CouponRecord>>,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rows(&self) -> Vec<CouponRecord> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl CouponSink for MemorySink {
    async fn upsert(&self, rows: &[CouponRecord]) -> Result<u64, SinkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(SinkError::PartialFailure {
                reason: "database unavailable".into(),
            });
        }
        let mut stored = self.rows.lock().unwrap();
        for row in rows {
            match stored
                .iter_mut()
                .find(|r| r.domain == row.domain && r.code == row.code)
            {
                Some(existing) => *existing = row.clone(),
                None => stored.push(row.clone()),
            }
        }
        Ok(rows.len() as u64)
    }
}

pub fn listing(domains: &[&str]) -> String {
    let links: String = domains
        .iter()
        .map(|d| format!(r#"<li><a href="/site/{d}">{d}</a></li>"#))
        .collect();
    format!("<html><body><ul class=\"stores\">{links}</ul></body></html>")
}

pub fn reveal_modal(code: &str) -> String {
    format!(r#"<html><body><input id="code" class="input code" value="{code}"></body></html>"#)
}
