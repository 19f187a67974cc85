mod config;
mod detector;
mod error;
mod handlers;
mod metrics;
mod models;
mod rate_limit;
mod state;

use axum::{
    Router,
    routing::{get, post},
};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Args;
use crate::detector::Detector;
use crate::handlers::{check_wordpress_handler, health_handler, metrics_handler};
use crate::rate_limit::RateLimiter;
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/check-wordpress", post(check_wordpress_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "wpcheck=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let state = Arc::new(AppState {
        detector: Detector::new(&args.detector_config())?,
        rate_limiter: RateLimiter::new(args.rate_limit, args.rate_window()?),
    });

    let app = build_router(state);

    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(%addr, "wpcheck listening");
    info!(
        rate_limit = args.rate_limit,
        rate_window_secs = args.rate_window,
        fetch_timeout_secs = args.fetch_timeout,
        probe_timeout_secs = args.probe_timeout,
        "detector configured"
    );

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
