use zcash_ledger_sync::{
    blockchain::{processor, ChainSource, RpcClient},
    config::Config,
    models::Block,
};
use tracing::{error, info, Level};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Setup tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("Probing node...");

    let config = Config::from_env()?;
    let client = RpcClient::new(&config.rpc)?;

    // 1. Chain tip
    let tip = client.get_block_count().await?;
    info!("✅ Current tip: {}", tip);

    // 2. Tip block
    let hash = client.get_block_hash(tip).await?;
    let rpc_block = client.get_block(&hash).await?;
    info!("✅ Block {} ({}) with {} transactions", rpc_block.height, rpc_block.hash, rpc_block.tx.len());

    let block = Block {
        height: rpc_block.height as i64,
        hash: rpc_block.hash.clone(),
        timestamp: rpc_block.time,
    };

    // 3. Projection, without touching the ledger
    for (index, raw) in rpc_block.tx.iter().enumerate() {
        match processor::project(raw, &block, index) {
            Ok(projected) => {
                let tx = &projected.transaction;
                info!(
                    "   {} type={} shielded={} fee={} inputs={} outputs={}",
                    tx.txid,
                    tx.tx_type,
                    tx.is_shielded,
                    tx.fee,
                    projected.inputs.len(),
                    projected.outputs.len()
                );
            }
            Err(e) => error!("❌ Failed to project transaction {}: {}", index, e),
        }
    }

    info!("Probe completed");
    Ok(())
}
