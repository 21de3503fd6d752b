mod api;
mod cache;
mod client;
mod config;
mod erc20;
mod health;
mod metrics;
mod models;
mod rpc;

#[cfg(test)]
mod testutil;

use std::sync::Arc;

use eyre::WrapErr;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cache::ContractCache;
use crate::client::Client;
use crate::config::Config;
use crate::erc20::Erc20Caller;
use crate::health::HealthMonitor;
use crate::metrics::Metrics;
use crate::rpc::{AlloyTransport, ChainTransport};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cfg = config::load().wrap_err("error initializing config")?;
    init_logging(&cfg);

    info!(
        "{} {} starting (env: {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        cfg.app_env
    );
    info!("  Node: {}", cfg.ethereum_address);
    info!("  Node mode: {:?}", cfg.node_mode);
    info!("  Listen: {}", cfg.listen_addr());

    let erc20_abi = erc20::load_abi().wrap_err("error parsing erc20 abi")?;
    let transport: Arc<dyn ChainTransport> = Arc::new(AlloyTransport::connect(&cfg.ethereum_address)?);

    let metrics = Arc::new(Metrics::new().wrap_err("error registering metrics")?);

    let caller = Erc20Caller::new(cfg.node_mode);
    let client = Arc::new(Client::new(
        caller,
        Arc::clone(&transport),
        Arc::new(ContractCache::new()),
        erc20_abi,
        Arc::clone(&metrics),
    ));

    // Seed the cache with the predefined networks
    for network in &cfg.networks {
        info!(
            name = %network.name,
            address = %network.address,
            node_address = %cfg.ethereum_address,
            "Loading network"
        );
        client
            .load_network(&network.name, network.address)
            .await
            .wrap_err_with(|| format!("error loading network {}", network.name))?;
    }
    info!("Loaded {} network(s) in {:?} mode", client.cache().len(), caller.mode());

    let health = Arc::new(HealthMonitor::new());
    let health_handle = tokio::spawn(Arc::clone(&health).run(
        Arc::clone(&transport),
        cfg.health_check_interval,
    ));

    let api_handle = tokio::spawn({
        let addr = cfg.listen_addr();
        let state = api::AppState {
            client,
            health,
            metrics,
        };
        async move { api::serve(&addr, state).await }
    });

    tokio::select! {
        res = api_handle => match res {
            Ok(Ok(_)) => info!("API exited cleanly"),
            Ok(Err(e)) => error!("API error: {:?}", e),
            Err(e) => error!("API task panicked: {:?}", e),
        },
        res = health_handle => if let Err(e) = res {
            error!("Health check task panicked: {:?}", e);
        },
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received, stopping...");
        }
    }

    info!("ERC20 worker stopped.");
    Ok(())
}

// Console output at DEBUG for development, JSON at INFO otherwise. RUST_LOG wins.
fn init_logging(cfg: &Config) {
    let default_level = if cfg.is_development() { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if cfg.is_development() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    }
}
