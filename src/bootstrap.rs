use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::{
    actions::{ActionRecorder, ActionStore, BotActionRepository, InMemoryActionStore},
    api::{models::ConfigSnapshot, AppState},
    config::KeeperConfig,
    contract::ContractGateway,
    error::AppResult,
    execution::{PipelineConfig, TransactionPipeline},
    keeper::{PolicyScheduler, ShutdownController},
    ledger::{format_ether, LedgerClient, RpcLedgerClient},
    policy::{CompoundPolicy, Policy, PolicyContext, RebalancePolicy, RebalanceStrategy},
    server::{create_app, run_server},
};

/// Wire every component, run until SIGINT / SIGTERM, then drain within the grace period
pub async fn run(config: KeeperConfig) -> AppResult<()> {
    info!("Initializing keeper components ...");

    let ledger = Arc::new(RpcLedgerClient::new(
        &config.rpc_endpoint,
        config.fallback_rpc_endpoints.clone(),
    )?);
    let block = ledger.block_number().await?;
    info!(
        "✅ Connected to ledger {} at block {}",
        ledger.current_endpoint().await,
        block
    );

    let shutdown = ShutdownController::new();
    let ledger: Arc<dyn LedgerClient> = ledger;

    let gateway = ContractGateway::new(ledger.clone(), config.contract_address);
    let pipeline = Arc::new(TransactionPipeline::new(
        ledger.clone(),
        gateway.clone(),
        config.signer.clone(),
        PipelineConfig::from(&config),
        shutdown.signal(),
    ));

    info!("🔑 Keeper address: {}", pipeline.address());
    match pipeline.balance().await {
        Ok(balance) => info!("💰 Keeper balance: {} ETH", format_ether(balance)),
        Err(e) => warn!("⚠️  Failed to fetch keeper balance: {}", e),
    }

    let store = initialize_store(&config).await?;
    let ctx = PolicyContext {
        gateway,
        pipeline,
        recorder: ActionRecorder::new(store.clone()),
    };

    let compound: Arc<dyn Policy> =
        Arc::new(CompoundPolicy::new(ctx.clone(), config.min_compound_fee));
    let rebalance = RebalancePolicy::new(ctx, RebalanceStrategy::from_config(&config)?);
    info!("⚖️  Rebalance strategy: {:?}", rebalance.strategy().kind());
    let rebalance: Arc<dyn Policy> = Arc::new(rebalance);

    let mut tasks: Vec<JoinHandle<()>> = vec![
        PolicyScheduler::new(compound, config.compound_interval, shutdown.signal()).start(),
        PolicyScheduler::new(rebalance, config.rebalance_interval, shutdown.signal()).start(),
    ];

    let state = AppState {
        store,
        config: Arc::new(ConfigSnapshot::from(&config)),
    };
    let app = create_app(state).await;
    let bind_address = config.bind_address.clone();
    let server_shutdown = shutdown.signal();
    tasks.push(tokio::spawn(async move {
        if let Err(e) = run_server(app, &bind_address, server_shutdown).await {
            error!("❌ HTTP server failed: {}", e);
        }
    }));

    info!("🚀 Keeper running");

    wait_for_termination().await;
    shutdown.trigger();

    match tokio::time::timeout(config.shutdown_grace, join_all(tasks)).await {
        Ok(_) => info!("✓ All keeper tasks stopped"),
        Err(_) => warn!(
            "⚠️  Tasks still running after {:?} grace period, exiting",
            config.shutdown_grace
        ),
    }

    Ok(())
}

async fn initialize_store(config: &KeeperConfig) -> AppResult<Arc<dyn ActionStore>> {
    match &config.database_url {
        Some(database_url) => {
            let pool = initialize_database(database_url).await?;
            Ok(Arc::new(BotActionRepository::new(pool)))
        }
        None => {
            warn!("⚠️  DATABASE_URL not set - actions are kept in memory only");
            Ok(Arc::new(InMemoryActionStore::new()))
        }
    }
}

async fn initialize_database(database_url: &str) -> AppResult<PgPool> {
    info!("📊 Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(25)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await?;

    info!("🔄 Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("✓ Database initialized");
    Ok(pool)
}

async fn wait_for_termination() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl-c"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
