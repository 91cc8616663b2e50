pub mod client;
pub mod models;
pub mod polling;
pub mod processor;
pub mod script;
pub mod synchronizer;

// Re-exports for convenience
pub use client::{ChainSource, RpcClient, RpcError};
pub use polling::{Step, SyncLoop};
pub use synchronizer::{sync_block, SyncError};
