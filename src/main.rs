//! Gauge Scope - HTTP server
//!
//! Run with: cargo run
//!
//! Serves gauge verification, gauge info and cache admin routes. All
//! settings come from the environment (see `config.rs`).

use color_eyre::eyre::Result;
use console::style;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gauge_scope::api::{self, AppState};
use gauge_scope::build_service;
use gauge_scope::config::Config;

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" 🔭 GAUGE SCOPE - Curve Gauge Verification API").cyan().bold()
    );
    println!(
        "{}",
        style("    Trusted Factories | Multicall3 | Provider Boosts").cyan()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

fn init_logging(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("gauge_scope={},tower_http=info", config.log_level)))?;

    let (json, compact) = if config.log_json {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer().compact()))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(compact)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let config = Config::from_env()?;
    init_logging(&config)?;

    print_banner();
    config.print_summary();
    config.validate()?;

    if config.admin_api_key.is_none() {
        warn!("ADMIN_API_KEY not set - admin routes will reject every request");
    }

    let service = build_service(&config)?;

    // Warm the gauge list so the first request does not pay for the fetch
    let warmup = service.cache().force_refresh().await;
    if warmup.success {
        info!("Gauge metadata ready ({:?}, {}ms)", warmup.source, warmup.elapsed_ms);
    } else {
        warn!("Gauge metadata unavailable at startup, will retry on demand");
    }

    let state = Arc::new(AppState {
        service,
        admin_api_key: config.admin_api_key.clone(),
    });
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
