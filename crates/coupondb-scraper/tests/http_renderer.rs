//! `HttpRenderer` and a full sweep against wiremock-served pages.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{listing, reveal_modal, test_config, MemorySink};
use coupondb_core::{CouponSink, MerchantDomain};
use coupondb_scraper::{
    render_page, HttpRenderer, Orchestrator, RenderError, RenderOptions, Renderer, WaitCondition,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn options(timeout: Duration) -> RenderOptions {
    RenderOptions {
        wait: WaitCondition::DomReady,
        timeout,
        blocked: Vec::new(),
        wait_for_selector: None,
    }
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(body)
}

#[tokio::test]
async fn sends_browser_like_headers() {
    let server = MockServer::start().await;
    let config = test_config(&server.uri());

    Mock::given(method("GET"))
        .and(path("/site/acme.com"))
        .and(header("user-agent", config.user_agent.as_str()))
        .and(header("accept-language", "en-US,en;q=0.9"))
        .respond_with(html("<html><body>ok</body></html>"))
        .expect(1)
        .mount(&server)
        .await;

    let renderer = HttpRenderer::new(&config).expect("client should build");
    let url = format!("{}/site/acme.com", server.uri());
    let document = render_page(&renderer, &url, &options(Duration::from_secs(5)))
        .await
        .expect("page should render");

    assert_eq!(document.url, url);
    assert!(document.html.contains("ok"));
}

#[tokio::test]
async fn non_success_status_is_navigation_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let renderer = HttpRenderer::new(&test_config(&server.uri())).unwrap();
    let url = format!("{}/site/missing.com", server.uri());
    let err = render_page(&renderer, &url, &options(Duration::from_secs(5)))
        .await
        .unwrap_err();

    match err {
        RenderError::NavigationError { reason, .. } => assert!(reason.contains("404"), "{reason}"),
        other => panic!("expected NavigationError, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_response_is_navigation_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html("<html></html>").set_delay(Duration::from_millis(800)))
        .mount(&server)
        .await;

    let renderer = HttpRenderer::new(&test_config(&server.uri())).unwrap();
    let url = format!("{}/site/slow.com", server.uri());
    let err = render_page(&renderer, &url, &options(Duration::from_millis(100)))
        .await
        .unwrap_err();

    assert!(matches!(err, RenderError::NavigationTimeout { timeout_ms: 100, .. }), "{err:?}");
}

#[tokio::test]
async fn contexts_are_independent() {
    let server = MockServer::start().await;
    let renderer = HttpRenderer::new(&test_config(&server.uri())).unwrap();
    let a = renderer.acquire().await.unwrap();
    let b = renderer.acquire().await.unwrap();
    a.close().await;
    b.close().await;
}

#[tokio::test]
async fn sweep_over_http_persists_revealed_code() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/site/browse/a/all"))
        .respond_with(html(&listing(&["acme.com", "apex.org"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/site/acme.com"))
        .respond_with(html(
            r#"<div class="offer-card" data-type="coupon" data-is-verified="True" data-modal="/modal/123">
                 <p class="offer-title">20% off</p>
                 <p class="offer-description">Min spend $50</p>
               </div>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/site/apex.org"))
        .respond_with(html("<html><body></body></html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/modal/123"))
        .respond_with(html(&reveal_modal("SAVE20")))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let renderer = Arc::new(HttpRenderer::new(&config).unwrap());
    let sink = MemorySink::new();
    let orchestrator = Orchestrator::new(
        Arc::new(config),
        renderer,
        Arc::clone(&sink) as Arc<dyn CouponSink>,
    );

    let summary = orchestrator.run().await.expect("sweep should succeed");
    let rows = sink.rows();

    assert_eq!(summary.succeeded(), 2);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].domain, MerchantDomain::parse("acme.com").unwrap());
    assert_eq!(rows[0].code, "SAVE20");
    assert_eq!(rows[0].discount, "20% off");
    assert_eq!(rows[0].terms, "Min spend $50");
    assert!(rows[0].verified);
}
