//! Fixed-size pool of reusable render contexts for reveal fetches.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::RenderError;
use crate::render::{
    close_detached, navigate_with_timeout, Document, RenderContext, RenderOptions, Renderer,
};

type IdleContexts = Arc<Mutex<Vec<Box<dyn RenderContext>>>>;

/// At most `size` contexts exist at once. Contexts are opened lazily, handed
/// back for reuse after a clean release, and discarded after a failure.
pub struct ContextPool {
    renderer: Arc<dyn Renderer>,
    permits: Arc<Semaphore>,
    idle: IdleContexts,
}

impl ContextPool {
    #[must_use]
    pub fn new(renderer: Arc<dyn Renderer>, size: usize) -> Self {
        Self {
            renderer,
            permits: Arc::new(Semaphore::new(size.max(1))),
            idle: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Waits for a free slot, then reuses an idle context or opens a new one.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ContextUnavailable`] if the pool was closed or
    /// the renderer cannot open a context.
    pub async fn acquire(&self) -> Result<PooledContext, RenderError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| RenderError::ContextUnavailable("reveal pool closed".into()))?;

        let reused = lock(&self.idle).pop();
        let context = match reused {
            Some(context) => context,
            None => self.renderer.acquire().await?,
        };

        Ok(PooledContext {
            context: Some(context),
            idle: Arc::clone(&self.idle),
            healthy: true,
            _permit: permit,
        })
    }

    /// Number of contexts currently parked for reuse.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        lock(&self.idle).len()
    }

    /// Refuses further acquisitions and closes every idle context.
    pub async fn close(self) {
        self.permits.close();
        let drained: Vec<_> = lock(&self.idle).drain(..).collect();
        for context in drained {
            context.close().await;
        }
    }
}

impl Drop for ContextPool {
    fn drop(&mut self) {
        for context in lock(&self.idle).drain(..) {
            close_detached(context);
        }
    }
}

fn lock(idle: &IdleContexts) -> MutexGuard<'_, Vec<Box<dyn RenderContext>>> {
    idle.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A context checked out of a [`ContextPool`].
///
/// Call [`PooledContext::release`] to hand it back. Dropping it instead (for
/// example on cancellation) closes the context rather than reusing it.
pub struct PooledContext {
    context: Option<Box<dyn RenderContext>>,
    idle: IdleContexts,
    healthy: bool,
    _permit: OwnedSemaphorePermit,
}

impl PooledContext {
    /// Navigates under `options.timeout`. A failed navigation marks the
    /// context as unfit for reuse.
    ///
    /// # Errors
    ///
    /// Returns the navigation error or timeout.
    pub async fn navigate(
        &mut self,
        url: &str,
        options: &RenderOptions,
    ) -> Result<Document, RenderError> {
        let context = self
            .context
            .as_deref_mut()
            .ok_or_else(|| RenderError::ContextUnavailable("context already released".into()))?;
        let result = navigate_with_timeout(context, url, options).await;
        if result.is_err() {
            self.healthy = false;
        }
        result
    }

    /// Returns a healthy context to the pool, or closes a failed one.
    pub async fn release(mut self) {
        if let Some(context) = self.context.take() {
            if self.healthy {
                lock(&self.idle).push(context);
            } else {
                context.close().await;
            }
        }
    }
}

impl Drop for PooledContext {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            close_detached(context);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::render::WaitCondition;

    #[derive(Default)]
    struct Counters {
        opened: AtomicUsize,
        closed: AtomicUsize,
    }

    struct CountingRenderer(Arc<Counters>);

    struct CountingContext(Arc<Counters>);

    #[async_trait]
    impl Renderer for CountingRenderer {
        async fn acquire(&self) -> Result<Box<dyn RenderContext>, RenderError> {
            self.0.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingContext(Arc::clone(&self.0))))
        }
    }

    #[async_trait]
    impl RenderContext for CountingContext {
        async fn navigate(
            &mut self,
            url: &str,
            _options: &RenderOptions,
        ) -> Result<Document, RenderError> {
            if url.ends_with("/fail") {
                return Err(RenderError::NavigationError {
                    url: url.to_string(),
                    reason: "boom".into(),
                });
            }
            Ok(Document::new(url, "<html></html>"))
        }

        async fn close(self: Box<Self>) {
            self.0.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn options() -> RenderOptions {
        RenderOptions {
            wait: WaitCondition::DomReady,
            timeout: Duration::from_secs(1),
            blocked: Vec::new(),
            wait_for_selector: None,
        }
    }

    fn pool(size: usize) -> (ContextPool, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let renderer = Arc::new(CountingRenderer(Arc::clone(&counters)));
        (ContextPool::new(renderer, size), counters)
    }

    #[tokio::test]
    async fn released_context_is_reused() {
        let (pool, counters) = pool(2);

        let mut ctx = pool.acquire().await.unwrap();
        ctx.navigate("https://site.test/modal/1", &options()).await.unwrap();
        ctx.release().await;
        assert_eq!(pool.idle_count(), 1);

        let ctx = pool.acquire().await.unwrap();
        ctx.release().await;

        assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
        pool.close().await;
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_context_is_discarded() {
        let (pool, counters) = pool(2);

        let mut ctx = pool.acquire().await.unwrap();
        assert!(ctx.navigate("https://site.test/fail", &options()).await.is_err());
        ctx.release().await;

        assert_eq!(pool.idle_count(), 0);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
        pool.close().await;
        assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn acquisition_blocks_at_capacity() {
        let (pool, counters) = pool(2);
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();

        let third = tokio::time::timeout(Duration::from_millis(50), pool.acquire()).await;
        assert!(third.is_err(), "third acquire should wait for a free slot");

        a.release().await;
        let c = pool.acquire().await.unwrap();
        assert_eq!(counters.opened.load(Ordering::SeqCst), 2);

        b.release().await;
        c.release().await;
        pool.close().await;
        assert_eq!(
            counters.opened.load(Ordering::SeqCst),
            counters.closed.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn dropped_context_is_closed_not_reused() {
        let (pool, counters) = pool(1);
        let ctx = pool.acquire().await.unwrap();
        drop(ctx);
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(pool.idle_count(), 0);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
        pool.close().await;
    }
}
