mod actions;
mod api;
mod bootstrap;
mod config;
mod contract;
mod error;
mod execution;
mod keeper;
mod ledger;
mod middleware;
mod policy;
mod server;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::KeeperConfig;

// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,tower_http=debug,pool_keeper=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(environment: ::config::Environment) -> anyhow::Result<KeeperConfig> {
    KeeperConfig::load(environment).context("Failed to load keeper configuration")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    info!("🚀 Starting liquidity pool keeper");

    let config = load_config(::config::Environment::default().try_parsing(true))?;
    info!(
        "Contract {} on chain {} via {}",
        config.contract_address, config.chain_id, config.rpc_endpoint
    );

    bootstrap::run(config)
        .await
        .context("Keeper terminated with an error")?;

    info!("👋 Keeper stopped");
    Ok(())
}
