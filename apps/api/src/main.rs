mod branding;
mod config;
mod errors;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::branding::{FitSettings, RetryPolicy};
use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first so the log level can come from it
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Brander API v{}", env!("CARGO_PKG_VERSION"));

    let fit = FitSettings::default();
    info!(
        "Compositing: padding {}pt, shrink {} (margin {}%), {} write attempts",
        fit.padding,
        fit.allow_shrink,
        fit.shrink_margin_pct,
        RetryPolicy::default().max_attempts
    );
    info!("Output directory: {}", config.output_dir.display());
    match &config.default_letterhead {
        Some(path) => info!("Default letterhead: {}", path.display()),
        None => info!("No default letterhead configured; uploads must include one"),
    }

    let state = AppState::new(config.clone());

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
