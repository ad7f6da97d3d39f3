mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use coupondb_core::CouponSink;
use coupondb_scraper::Orchestrator;
use tracing_subscriber::EnvFilter;

use crate::api::{build_app, default_rate_limit_state, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(coupondb_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool = coupondb_db::connect_pool_from_config(&config).await?;
    let applied = coupondb_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations up to date");

    // One renderer and orchestrator serve both live lookups and scheduled sweeps.
    let orchestrator = if config.scrape_now_enabled || config.sweep_cron.is_some() {
        let renderer = coupondb_scraper::build_renderer(&config.scrape).await?;
        let sink: Arc<dyn CouponSink> = Arc::new(coupondb_db::PgCouponSink::new(pool.clone()));
        Some(Arc::new(Orchestrator::new(
            Arc::new(config.scrape.clone()),
            renderer,
            sink,
        )))
    } else {
        None
    };

    let _scheduler =
        scheduler::build_scheduler(pool.clone(), Arc::clone(&config), orchestrator.clone())
            .await?;

    let state = AppState {
        pool,
        scraper: orchestrator.clone().filter(|_| config.scrape_now_enabled),
    };
    let app = build_app(state, default_rate_limit_state());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, env = %config.env, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(orchestrator) = orchestrator {
        orchestrator.shutdown().await;
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
