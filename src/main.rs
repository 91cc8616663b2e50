// Load configuration
// Set up logging
// Create database connection pool
// Create the node RPC client
// Run the sync loop until Ctrl-C

use std::process;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zcash_ledger_sync::{db, AppState, Config, RpcClient, SyncLoop};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting zcash-ledger-sync");

    // Load configuration
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };
    tracing::info!("Configuration loaded for node {}", config.rpc.url);

    // Setup database connection
    let db_pool = db::connection::establish_connection(&config.database_url, config.db_max_connections).await?;

    let client = RpcClient::new(&config.rpc)?;

    let app_state = Arc::new(AppState {
        config,
        db_pool,
        chain: Arc::new(client),
    });

    let shutdown = CancellationToken::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            signal_shutdown.cancel();
        }
    });

    SyncLoop::new(app_state.clone()).run(shutdown).await;

    app_state.db_pool.close().await;
    Ok(())
}
