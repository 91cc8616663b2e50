//! Fixtures shared by the ledger and sync tests: an in-memory ledger and a
//! scripted chain that can fail on demand and reorganize.

use crate::blockchain::client::{ChainSource, RpcError};
use crate::blockchain::models::RpcBlock;
use crate::config::{Config, RpcConfig, SyncConfig};
use crate::db::connection;
use crate::state::AppState;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const COINBASE_ZEC: f64 = 3.125;

pub fn fast_sync_config() -> SyncConfig {
    SyncConfig {
        poll_interval: Duration::from_millis(1),
        idle_interval: Duration::from_millis(1),
        error_pause: Duration::from_millis(1),
        block_retry_delay: Duration::from_millis(1),
        block_retry_max_delay: Duration::from_millis(4),
        block_max_attempts: 3,
        reorg_safety: 0,
    }
}

pub fn test_config(sync: SyncConfig) -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        db_max_connections: 1,
        rpc: RpcConfig::new("http://127.0.0.1:1", "user", "pass"),
        sync,
    }
}

pub async fn test_state(chain: Arc<FakeChain>, sync: SyncConfig) -> Arc<AppState> {
    let db_pool = connection::in_memory().await.expect("in-memory ledger");

    Arc::new(AppState {
        config: test_config(sync),
        db_pool,
        chain,
    })
}

pub fn miner_address(height: u64) -> String {
    format!("t1miner{:04}", height)
}

pub fn user_address(height: u64) -> String {
    format!("t1user{:04}", height)
}

pub fn coinbase_txid(hash: &str) -> String {
    format!("cb-{}", hash)
}

pub fn transfer_txid(hash: &str) -> String {
    format!("tx-{}", hash)
}

#[derive(Default)]
struct ChainInner {
    blocks: BTreeMap<u64, RpcBlock>,
    /// Remaining `getblock` failures per height.
    block_failures: HashMap<u64, u32>,
    tip_failures: u32,
    getblock_calls: HashMap<u64, u32>,
}

/// Deterministic chain. Every block carries a coinbase; from height 2 on it
/// also carries a transfer spending the previous block's coinbase.
pub struct FakeChain {
    inner: Mutex<ChainInner>,
}

impl FakeChain {
    pub fn with_height(tip: u64) -> Arc<Self> {
        let chain = Self {
            inner: Mutex::new(ChainInner::default()),
        };
        chain.extend_to(tip, "a");
        Arc::new(chain)
    }

    pub fn extend_to(&self, tip: u64, tag: &str) {
        let mut inner = self.inner.lock().unwrap();
        let start = inner.blocks.keys().next_back().map(|h| h + 1).unwrap_or(0);
        for height in start..=tip {
            let block = build_block(&inner.blocks, height, tag);
            inner.blocks.insert(height, block);
        }
    }

    /// Replaces every block from `height` up to the current tip with a
    /// competing branch tagged `tag`.
    pub fn reorganize_from(&self, height: u64, tag: &str) {
        let mut inner = self.inner.lock().unwrap();
        let tip = inner.blocks.keys().next_back().copied().unwrap_or(0);
        for h in height..=tip {
            let block = build_block(&inner.blocks, h, tag);
            inner.blocks.insert(h, block);
        }
    }

    pub fn fail_block(&self, height: u64, times: u32) {
        self.inner.lock().unwrap().block_failures.insert(height, times);
    }

    pub fn fail_tip(&self, times: u32) {
        self.inner.lock().unwrap().tip_failures = times;
    }

    pub fn block(&self, height: u64) -> RpcBlock {
        self.inner.lock().unwrap().blocks[&height].clone()
    }

    pub fn getblock_calls(&self, height: u64) -> u32 {
        self.inner
            .lock()
            .unwrap()
            .getblock_calls
            .get(&height)
            .copied()
            .unwrap_or(0)
    }
}

fn node_error(method: &str, message: &str) -> RpcError {
    RpcError::Node {
        method: method.to_string(),
        code: -8,
        message: message.to_string(),
    }
}

#[async_trait]
impl ChainSource for FakeChain {
    async fn get_block_count(&self) -> Result<u64, RpcError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.tip_failures > 0 {
            inner.tip_failures -= 1;
            return Err(node_error("getblockcount", "Loading block index..."));
        }
        Ok(inner.blocks.keys().next_back().copied().unwrap_or(0))
    }

    async fn get_block_hash(&self, height: u64) -> Result<String, RpcError> {
        let inner = self.inner.lock().unwrap();
        inner
            .blocks
            .get(&height)
            .map(|b| b.hash.clone())
            .ok_or_else(|| node_error("getblockhash", "Block height out of range"))
    }

    async fn get_block(&self, hash: &str) -> Result<RpcBlock, RpcError> {
        let mut inner = self.inner.lock().unwrap();
        let block = inner
            .blocks
            .values()
            .find(|b| b.hash == hash)
            .cloned()
            .ok_or_else(|| node_error("getblock", "Block not found"))?;

        *inner.getblock_calls.entry(block.height).or_insert(0) += 1;

        if let Some(remaining) = inner.block_failures.get_mut(&block.height) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(node_error("getblock", "Block not available"));
            }
        }

        Ok(block)
    }
}

fn build_block(existing: &BTreeMap<u64, RpcBlock>, height: u64, tag: &str) -> RpcBlock {
    let hash = format!("{}-{:08}", tag, height);
    let previous_block_hash = height
        .checked_sub(1)
        .and_then(|parent| existing.get(&parent))
        .map(|parent| parent.hash.clone());

    let mut tx = vec![json!({
        "txid": coinbase_txid(&hash),
        "version": 5,
        "locktime": 0,
        "vin": [{"coinbase": "03a08601", "sequence": 4294967295u32}],
        "vout": [{
            "value": COINBASE_ZEC,
            "n": 0,
            "scriptPubKey": {"type": "pubkeyhash", "addresses": [miner_address(height)]}
        }],
        "vjoinsplit": [],
        "orchard": {"actions": []}
    })];

    if let Some(parent_hash) = previous_block_hash.as_ref().filter(|_| height >= 2) {
        tx.push(transfer(&hash, parent_hash, height));
    }

    RpcBlock {
        hash,
        height,
        time: 1_700_000_000 + height as i64 * 75,
        previous_block_hash,
        tx,
    }
}

fn transfer(hash: &str, parent_hash: &str, height: u64) -> Value {
    let change_script = json!({"addresses": [miner_address(height - 1)]}).to_string();

    json!({
        "txid": transfer_txid(hash),
        "version": 4,
        "locktime": 0,
        "vin": [{
            "txid": coinbase_txid(parent_hash),
            "vout": 0,
            "value": COINBASE_ZEC,
            "address": miner_address(height - 1)
        }],
        "vout": [
            {"value": 3.0, "n": 0, "scriptPubKey": {"addresses": [user_address(height)]}},
            {"value": 0.1249, "n": 1, "scriptPubKey": change_script}
        ]
    })
}
