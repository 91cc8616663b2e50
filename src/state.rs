use crate::blockchain::ChainSource;
use crate::config::Config;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared context built once at startup and handed to every component.
pub struct AppState {
    pub config: Config,
    pub db_pool: SqlitePool,
    pub chain: Arc<dyn ChainSource>,
}
