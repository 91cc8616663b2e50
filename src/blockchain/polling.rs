use crate::blockchain::synchronizer::{self, SyncError};
use crate::db::block;
use crate::state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of one loop iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Advanced { height: u64, transactions: usize },
    CaughtUp { cursor: u64, tip: u64 },
    RolledBack { fork_height: u64, removed: u64 },
}

/// Walks the chain one height at a time, tailing the node's tip.
pub struct SyncLoop {
    state: Arc<AppState>,
    cursor: Option<u64>,
}

impl SyncLoop {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state, cursor: None }
    }

    /// Last height known to be fully ingested, once the loop has resumed.
    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    /// Runs a single iteration: resume if needed, compare with the confirmed
    /// tip and ingest at most one height.
    pub async fn tick(&mut self) -> Result<Step, SyncError> {
        let cursor = match self.cursor {
            Some(cursor) => cursor,
            None => {
                let resumed = block::last_indexed_height(&self.state.db_pool).await?;
                info!("Resuming chain sync after height {}", resumed);
                self.cursor = Some(resumed);
                resumed
            }
        };

        let tip = self.state.chain.get_block_count().await?;
        let confirmed = tip.saturating_sub(self.state.config.sync.reorg_safety);

        if cursor >= confirmed {
            debug!("Caught up at height {} (tip {})", cursor, tip);
            return Ok(Step::CaughtUp { cursor, tip });
        }

        let next = cursor + 1;
        match synchronizer::sync_block(&self.state, next).await {
            Ok(transactions) => {
                self.cursor = Some(next);
                info!("Synced block {} with {} transactions (tip {})", next, transactions, tip);
                Ok(Step::Advanced {
                    height: next,
                    transactions,
                })
            }
            Err(SyncError::Reorg { fork_height }) => {
                let removed = block::delete_blocks_from(&self.state.db_pool, fork_height).await?;
                let rewound = fork_height.saturating_sub(1);
                self.cursor = Some(rewound);
                warn!(
                    "Reorg at height {}: removed {} blocks, resuming after height {}",
                    fork_height, removed, rewound
                );
                Ok(Step::RolledBack { fork_height, removed })
            }
            Err(e) => Err(e),
        }
    }

    /// Runs until `shutdown` fires. Shutdown is only observed while pausing
    /// between iterations, so an in-flight height always completes.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Starting chain sync loop");
        let settings = self.state.config.sync.clone();

        loop {
            let pause: Duration = match self.tick().await {
                Ok(Step::Advanced { .. }) | Ok(Step::RolledBack { .. }) => settings.poll_interval,
                Ok(Step::CaughtUp { .. }) => settings.idle_interval,
                Err(e) => {
                    error!("Sync iteration failed at cursor {:?}: {}", self.cursor, e);
                    settings.error_pause
                }
            };

            tokio::select! {
                _ = sleep(pause) => {}
                _ = shutdown.cancelled() => {
                    info!("Shutting down chain sync loop at height {:?}", self.cursor);
                    break;
                }
            }
        }
    }
}
