use std::sync::Arc;

use axum::extract::FromRef;

use shared_cache::{CacheStore, MemoryCache};
use shared_config::AppConfig;

/// Router state shared by every cell.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub cache: Arc<dyn CacheStore>,
}

impl AppState {
    pub fn new(config: AppConfig, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            config: Arc::new(config),
            cache,
        }
    }

    /// State backed by the in-process cache.
    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(config, Arc::new(MemoryCache::new()))
    }
}

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<dyn CacheStore> {
    fn from_ref(state: &AppState) -> Self {
        state.cache.clone()
    }
}
