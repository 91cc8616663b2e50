pub mod blockchain;
pub mod config;
pub mod db;
pub mod models;
pub mod state;

#[cfg(test)]
pub mod tests;

// Re-export specific items for convenience
pub use blockchain::{sync_block, ChainSource, RpcClient, RpcError, Step, SyncError, SyncLoop};
pub use config::{Config, ConfigError};
pub use db::connection;
pub use models::{Block, Input, Output, ProjectedTransaction, Transaction, TxType};
pub use state::AppState;
