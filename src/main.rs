use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use live_counting_bridge::cli::Args;
use live_counting_bridge::{config, http_client, session};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "live_counting_bridge=info".into()),
        )
        .init();

    let args = Args::parse();

    let config = match config::load(args.config.as_deref()) {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    if config.threads.is_empty() {
        warn!("no threads configured, nothing to bridge");
    }
    info!(
        api_base = %config.api_base,
        threads = config.threads.len(),
        authenticated = config.token.is_some(),
        "starting bridge"
    );

    let http = http_client();
    let handles = session::spawn_all(session::sessions(&config, &http));

    tokio::select! {
        _ = futures_util::future::join_all(handles) => {
            info!("all thread sessions have stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
        }
    }
}
