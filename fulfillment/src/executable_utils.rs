//! Shared bootstrap glue for the `api` and `worker` binaries.

use axum::{Router, http::StatusCode, response::IntoResponse};
use clap::Parser;
use common::config::Config;
use http::header::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to config file
    #[arg(short, long, default_value = "config/dev.yaml")]
    pub config: String,
}

/// Parse args, load `.env`, load the YAML config. A `DATABASE_URL`
/// environment variable overrides the configured one so deployments can
/// inject credentials without editing the file.
pub fn initialize_executable() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let mut config = Config::load(&args.config)?;
    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.common.database_url = url;
    }
    Ok(config)
}

/// Install the tracing subscriber. `RUST_LOG` wins over the configured
/// level.
pub fn initialize_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK").into_response()
}

/// CORS layer for the storefront origin; an unparsable origin falls back
/// to allowing any, which matches local development setups.
pub fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origin.parse::<HeaderValue>() {
        Ok(value) => layer.allow_origin(value),
        Err(_) => layer.allow_origin(Any),
    }
}

pub async fn serve(app: Router, server_address: &str) -> anyhow::Result<()> {
    tracing::info!("listening on {server_address}");
    let listener = tokio::net::TcpListener::bind(server_address).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
