//! skaldd — Skald daemon.
//!
//! Serves the [`Extractor`](skald::Extractor) over HTTP, so every client
//! shares one result cache and one set of rate windows.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use skald::server::config::{Config, GOOGLE_VISION_API_KEY_ENV, Secrets};
use skald::server::{AppState, serve};
use skald::{Extractor, Skald, SkaldError};

/// Skald daemon — cached, rate-limited OCR gateway.
#[derive(Parser)]
#[command(name = "skaldd")]
#[command(version = skald::PKG_VERSION)]
#[command(about = "Skald OCR gateway daemon")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the config file.
    #[arg(short, long, env = "SKALD_ADDRESS")]
    address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;
    let secrets = Secrets::load()?;

    let extractor = build_extractor(&config, &secrets)?;
    let address = args.address.unwrap_or_else(|| config.server.address.clone());

    let listener = TcpListener::bind(&address).await.map_err(|e| {
        SkaldError::Configuration(format!("Failed to bind {address}: {e}"))
    })?;

    info!(
        version = skald::PKG_VERSION,
        %address,
        cache_max_size = config.cache.max_size,
        cache_ttl_secs = config.cache.ttl_secs,
        "skaldd starting"
    );

    let state = AppState::new(Arc::new(extractor))
        .trust_forwarded_for(config.server.trust_forwarded_for);
    serve(listener, state, shutdown_signal()).await?;

    info!("skaldd stopped");
    Ok(())
}

/// Build the [`Extractor`] from configuration.
fn build_extractor(config: &Config, secrets: &Secrets) -> Result<Extractor, SkaldError> {
    let key = secrets.google_vision_key().ok_or_else(|| {
        SkaldError::Configuration(format!(
            "No Google Vision API key. Set [google_vision] api_key in secrets.toml or {GOOGLE_VISION_API_KEY_ENV}"
        ))
    })?;

    let mut builder = Skald::builder()
        .google_vision(key)
        .cache(config.cache_config())
        .rate_limits(config.rate_limit_config())
        .upload_limits(config.upload_limits())
        .timeout(config.timeout());

    if let Some(ref url) = config.recognizer.base_url {
        builder = builder.google_vision_url(url);
    }

    builder.build()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
